use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("scorecard-pipeline"));

// --- Transport ---

pub static RETRY_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("client.retry.count")
        .with_description("Number of retried remote calls")
        .with_unit("{retry}")
        .build()
});

pub static EXPORT_POLLS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("export.polls")
        .with_description("Number of export job status polls")
        .with_unit("{poll}")
        .build()
});

pub static EXPORT_JOBS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("export.jobs")
        .with_description("Export jobs by outcome")
        .with_unit("{job}")
        .build()
});

pub static EXPORT_ARTIFACT_SIZE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("export.artifact.size")
        .with_description("Size of downloaded export artifacts")
        .with_unit("By")
        .build()
});

// --- Analysis ---

pub static ANALYSIS_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("analysis.duration")
        .with_description("Duration of document analysis calls in seconds")
        .with_unit("s")
        .build()
});

// --- Domain Metrics ---

pub static REPORT_RENDER_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.render.duration")
        .with_description("Scorecard render duration in seconds")
        .with_unit("s")
        .build()
});

pub static REPORT_PAGES: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.pages")
        .with_description("Number of physical pages per rendered scorecard")
        .with_unit("{page}")
        .build()
});

// --- Delivery ---

pub static MESSAGES_SENT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("delivery.messages.sent")
        .with_description("Template messages accepted by the messaging API")
        .with_unit("{message}")
        .build()
});

pub static MESSAGES_FAILED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("delivery.messages.failed")
        .with_description("Template messages that could not be sent")
        .with_unit("{message}")
        .build()
});

// --- Batch ---

pub static BATCH_JOBS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("batch.jobs")
        .with_description("Batch job runs by outcome")
        .with_unit("{job}")
        .build()
});
