use criterion::{criterion_group, criterion_main, Criterion};
use websearch_core::tokenizer::tokenize;

const PAGE: &str = r#"<title>Field notes</title>
<h1>Ridge survey</h1>
<p>The quick red fox crossed the ridge at dawn, 14 degrees and clear.
Trail markers 7 through 21 were repainted; the lazy dog at the station
slept through all of it.</p>
<a href="/notes/day2.rw">next day</a>
"#;

fn bench_tokenize(c: &mut Criterion) {
    let text = PAGE.repeat(50);
    c.bench_function("tokenize_page", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
