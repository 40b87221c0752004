use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{EventRecord, EventStore, ExpectedVersion, InMemoryEventStore, Version};
use futures_util::StreamExt;

fn make_record(aggregate_id: AggregateId, version: u64) -> EventRecord {
    EventRecord::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Order")
        .event_type("RegistrantDetailsAssigned")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": "RegistrantDetailsAssigned",
            "data": {
                "registrant": {
                    "email": format!("attendee-{version}@contoso.com"),
                    "first_name": "First",
                    "last_name": "Last"
                }
            }
        }))
        .build()
        .unwrap()
}

async fn populated_store(aggregate_id: AggregateId, count: u64) -> InMemoryEventStore {
    let store = InMemoryEventStore::new();
    let records = (1..=count).map(|v| make_record(aggregate_id, v)).collect();
    store.append(records, ExpectedVersion::NoStream).await.unwrap();
    store
}

fn bench_append_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let record = make_record(AggregateId::new(), 1);
                store
                    .append(vec![record], ExpectedVersion::NoStream)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let agg_id = AggregateId::new();
                let records: Vec<EventRecord> = (1..=10).map(|v| make_record(agg_id, v)).collect();
                store.append(records, ExpectedVersion::Any).await.unwrap();
            });
        });
    });
}

fn bench_append_with_version_check(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_with_version_check", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let agg_id = AggregateId::new();
                store
                    .append(vec![make_record(agg_id, 1)], ExpectedVersion::NoStream)
                    .await
                    .unwrap();
                store
                    .append(
                        vec![make_record(agg_id, 2)],
                        ExpectedVersion::Exact(Version::first()),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_load_stream_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let agg_id = AggregateId::new();
    let store = rt.block_on(populated_store(agg_id, 100));

    c.bench_function("event_store/load_stream_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let records = store.load_stream(agg_id).await.unwrap();
                assert_eq!(records.len(), 100);
            });
        });
    });
}

fn bench_stream_all_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(populated_store(AggregateId::new(), 100));

    c.bench_function("event_store/stream_all_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let stream = store.stream_all(0).await.unwrap();
                let count = stream.count().await;
                assert_eq!(count, 100);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_event,
    bench_append_batch_10,
    bench_append_with_version_check,
    bench_load_stream_100,
    bench_stream_all_100,
);
criterion_main!(benches);
