use criterion::{black_box, criterion_group, criterion_main, Criterion};
use driver_presence::services::geo_index::encode_record;
use driver_presence::services::BoundaryGeocoder;
use geo::Point;
use geojson::GeoJson;
use std::fs;

fn benchmark_place_lookup(c: &mut Criterion) {
    // Load the boundaries once
    let geocoder = BoundaryGeocoder::load_from_file("data/bay_area_places.geojson")
        .expect("Failed to load place boundaries");

    // Replay points from the sample track
    let track_content =
        fs::read_to_string("data/sample_track.geojson").expect("Failed to read track");
    let track: GeoJson = track_content.parse().expect("Failed to parse track");
    let points: Vec<Point<f64>> = match track {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .filter_map(|g| geo::LineString::<f64>::try_from(g.value).ok())
            .flat_map(|line| line.points().collect::<Vec<_>>())
            .collect(),
        _ => panic!("Track should be a FeatureCollection"),
    };

    // Same points shifted out of every boundary (worst case: full scan)
    let far_away: Vec<Point<f64>> = points
        .iter()
        .map(|p| Point::new(p.x() + 5.0, p.y()))
        .collect();

    let mut group = c.benchmark_group("place_lookup");

    group.bench_function("track_inside_places", |b| {
        b.iter(|| {
            for p in &points {
                black_box(geocoder.find_locality(black_box(p)));
            }
        })
    });

    group.bench_function("track_outside_places", |b| {
        b.iter(|| {
            for p in &far_away {
                black_box(geocoder.find_locality(black_box(p)));
            }
        })
    });

    group.bench_function("geofire_record", |b| {
        b.iter(|| encode_record(black_box(37.4219), black_box(-122.0840)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_place_lookup);
criterion_main!(benches);
