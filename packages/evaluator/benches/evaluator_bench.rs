use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dcstruct_evaluator::{Composer, ComposerConfig, Descriptor, HeadlessHost};
use serde_json::json;
use std::rc::Rc;

fn form(fields: usize) -> Descriptor {
    (0..fields).fold(
        Descriptor::new("form")
            .with_namespace("bench")
            .with_prop("modelValue", json!({ "name": "", "email": "" })),
        |form, i| {
            form.with_child(
                Descriptor::new("label").with_key(format!("field-{i}")).with_child(
                    Descriptor::new("input")
                        .with_prop("modelValue", json!({ "path": format!("field{i}"), "value": i })),
                ),
            )
        },
    )
}

fn composer() -> Rc<Composer> {
    Composer::isolated(Rc::new(HeadlessHost::new()), ComposerConfig::default())
}

fn compose_cold(c: &mut Criterion) {
    let descriptor = form(10);

    c.bench_function("compose_cold_form_10", |b| {
        b.iter(|| {
            let composer = composer();
            composer.compose(black_box(&descriptor.fork()))
        })
    });
}

fn compose_cached(c: &mut Criterion) {
    let descriptor = form(50);
    let composer = composer();
    composer.compose(&descriptor).unwrap();

    c.bench_function("compose_cached_form_50", |b| {
        b.iter(|| composer.compose(black_box(&descriptor)))
    });
}

fn set_model_rerender(c: &mut Criterion) {
    let descriptor = form(20);
    let composer = composer();
    let node = composer.compose(&descriptor).unwrap();
    let input = node.uids()[2].clone();
    let mut n = 0u64;

    c.bench_function("set_model_rerender", |b| {
        b.iter(|| {
            n += 1;
            composer.set_model(black_box(&input), json!(n))
        })
    });
}

criterion_group!(benches, compose_cold, compose_cached, set_model_rerender);
criterion_main!(benches);
