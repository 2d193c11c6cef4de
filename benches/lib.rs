use criterion::{criterion_group, criterion_main};

use fit::*;

criterion_group!(benches_fit, bench_drude_fit, bench_model_fit);
criterion_main!(benches_fit);
