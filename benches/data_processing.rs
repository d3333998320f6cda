//! Benchmarks for array dispatch, thresholding and matrix resizing
//!
//! Run with: cargo bench

use arrayflow::pipeline::stages::{CompareOp, ThresholdArray};
use arrayflow::pipeline::{Phase, StageContext};
use arrayflow::store::{ArrayPath, AttributeMatrix, MatrixCategory, NamedArray, Registry};
use arrayflow::types::{Element, ElementType};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const SIZES: [usize; 3] = [1_000, 100_000, 1_000_000];

fn scalar_array(element_type: ElementType, tuples: usize) -> NamedArray {
    let mut array = NamedArray::create_dyn(element_type, "x", tuples, &[1]).unwrap();
    arrayflow::with_element_type!(element_type, T => {
        if let Some(mut view) = array.view_mut::<T>() {
            for (i, v) in view.as_mut_slice().iter_mut().enumerate() {
                *v = T::from_f64((i % 251) as f64);
            }
        }
    });
    array
}

fn sum_as_f64<T: Element>(array: &NamedArray) -> f64 {
    array
        .view::<T>()
        .map_or(0.0, |v| v.as_slice().iter().map(|x| x.to_f64()).sum())
}

fn bench_type_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("type_dispatch");
    let tuples = 100_000;

    for element_type in [ElementType::UInt8, ElementType::Int32, ElementType::Float64] {
        let array = scalar_array(element_type, tuples);
        group.throughput(Throughput::Elements(tuples as u64));
        group.bench_with_input(
            BenchmarkId::new("sum", element_type),
            &array,
            |b, array| {
                b.iter(|| {
                    let total = arrayflow::with_element_type!(array.element_type(), T => {
                        sum_as_f64::<T>(black_box(array))
                    });
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold");
    group.sample_size(20);

    for size in SIZES.iter() {
        let mut registry = Registry::new();
        registry
            .create_container("M")
            .unwrap()
            .create_attribute_matrix("cells", &[*size], MatrixCategory::Cell)
            .unwrap()
            .insert("x", scalar_array(ElementType::Float32, *size))
            .unwrap();
        let mut stage = ThresholdArray::new(
            ArrayPath::new("M", "cells", "x"),
            CompareOp::Greater,
            100.0,
            ArrayPath::new("M", "cells", "mask"),
        );

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("f32_greater", size), size, |b, _| {
            b.iter(|| {
                let mut ctx = StageContext::standalone(Phase::Execute).with_progress(false);
                stage.execute(&mut registry, &mut ctx).unwrap();
                black_box(ctx.has_error())
            });
        });
    }

    group.finish();
}

fn bench_matrix_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_resize");

    for size in SIZES.iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("grow_shrink", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let mut matrix = AttributeMatrix::new("cells", &[size], MatrixCategory::Cell);
                    for (name, ty) in [("a", ElementType::Float32), ("b", ElementType::Int64)] {
                        matrix.insert(name, scalar_array(ty, size)).unwrap();
                    }
                    matrix
                },
                |mut matrix| {
                    matrix.resize_tuples(&[size * 2]).unwrap();
                    matrix.resize_tuples(&[size / 2]).unwrap();
                    black_box(matrix)
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_type_dispatch,
    bench_threshold,
    bench_matrix_resize,
);

criterion_main!(benches);
