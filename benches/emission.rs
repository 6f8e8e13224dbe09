//! Benchmarks for IL assembly and method body encoding.
//!
//! Measures the dominant paths of dynamic code generation:
//! - Straight-line instruction emission and bake
//! - Branch-heavy streams with forward fixups
//! - Switch tables with many targets
//! - Binary body encoding (tiny and fat with exception clauses)
//! - Container define/create throughput and full commits

extern crate cilforge;

use cilforge::{opcodes, prelude::*};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn keep(token: Token) -> Result<Token> {
    Ok(token)
}

/// Benchmark assembling and baking a straight-line method.
/// Body: 64 nops followed by ret.
fn bench_assemble_straight_line(c: &mut Criterion) {
    c.bench_function("emit_straight_line", |b| {
        b.iter(|| {
            let mut il = IlAssembler::new();
            for _ in 0..64 {
                il.emit(&opcodes::NOP).unwrap();
            }
            il.emit(&opcodes::RET).unwrap();
            black_box(il.bake().unwrap())
        });
    });
}

/// Benchmark a branch-heavy stream: 32 forward conditional branches whose
/// fixups all resolve at bake.
fn bench_assemble_forward_branches(c: &mut Criterion) {
    c.bench_function("emit_forward_branches", |b| {
        b.iter(|| {
            let mut il = IlAssembler::new();
            let exit = il.define_label();
            for _ in 0..32 {
                il.emit(&opcodes::LDC_I4_1).unwrap();
                il.emit_branch(&opcodes::BRTRUE_S, exit).unwrap();
            }
            il.mark_label(exit).unwrap();
            il.emit(&opcodes::RET).unwrap();
            black_box(il.bake().unwrap())
        });
    });
}

/// Benchmark a 64-way jump table with forward targets.
fn bench_assemble_switch_table(c: &mut Criterion) {
    c.bench_function("emit_switch_table", |b| {
        b.iter(|| {
            let mut il = IlAssembler::new();
            let targets: Vec<Label> = (0..64).map(|_| il.define_label()).collect();
            il.emit(&opcodes::LDARG_0).unwrap();
            il.emit_switch(&opcodes::SWITCH, &targets).unwrap();
            for target in &targets {
                il.mark_label(*target).unwrap();
                il.emit(&opcodes::NOP).unwrap();
            }
            il.emit(&opcodes::RET).unwrap();
            black_box(il.bake().unwrap())
        });
    });
}

/// Benchmark encoding a tiny-format body.
fn bench_encode_tiny_body(c: &mut Criterion) {
    let mut il = IlAssembler::new();
    il.emit(&opcodes::LDARG_0).unwrap();
    il.emit(&opcodes::LDARG_1).unwrap();
    il.emit(&opcodes::ADD).unwrap();
    il.emit(&opcodes::RET).unwrap();
    let body = il.bake().unwrap();

    c.bench_function("encode_tiny_body", |b| {
        b.iter(|| black_box(body.encode(None, keep).unwrap()));
    });
}

/// Benchmark encoding a fat body with locals and an exception clause.
fn bench_encode_fat_body(c: &mut Criterion) {
    let mut il = IlAssembler::new();
    il.declare_local(TypeSig::I4).unwrap();
    let _done = il.begin_protected_region();
    il.emit(&opcodes::LDC_I4_0).unwrap();
    il.emit(&opcodes::STLOC_0).unwrap();
    il.begin_finally().unwrap();
    il.emit(&opcodes::NOP).unwrap();
    il.end_protected_region().unwrap();
    il.emit(&opcodes::RET).unwrap();
    let body = il.bake().unwrap();
    let sig_token = Token::new(0x1100_0001);

    c.bench_function("encode_fat_body", |b| {
        b.iter(|| black_box(body.encode(Some(sig_token), keep).unwrap()));
    });
}

/// Benchmark defining and creating 16 types with 4 body-less methods each.
fn bench_define_and_create_types(c: &mut Criterion) {
    let signature = method_signature(&MethodSig::default()).unwrap();

    c.bench_function("define_create_types", |b| {
        b.iter(|| {
            let module = ModuleBuilder::new("bench");
            for index in 0..16 {
                let ty = module
                    .define_type(format!("Type{index}"), TypeAttributes::PUBLIC, None, &[])
                    .unwrap();
                for method in 0..4 {
                    module
                        .define_method(
                            &ty,
                            format!("Method{method}"),
                            MethodAttributes::PUBLIC | MethodAttributes::ABSTRACT,
                            &signature,
                        )
                        .unwrap();
                }
                black_box(module.create_type(&ty).unwrap());
            }
        });
    });
}

/// Benchmark a full lifecycle: define, assemble with a pending call site,
/// create, and commit.
fn bench_full_commit(c: &mut Criterion) {
    let signature = method_signature(&MethodSig::default()).unwrap();

    c.bench_function("full_commit", |b| {
        b.iter(|| {
            let module = ModuleBuilder::new("bench");
            let flags = MethodAttributes::PUBLIC | MethodAttributes::STATIC;
            let ty = module
                .define_type("Worker", TypeAttributes::PUBLIC, None, &[])
                .unwrap();
            let callee = module.define_method(&ty, "Step", flags, &signature).unwrap();
            let caller = module.define_method(&ty, "Run", flags, &signature).unwrap();

            let mut il = module.il_stream(&caller).unwrap();
            let pending = module.method_token(&callee).unwrap();
            il.emit_call(&opcodes::CALL, pending, 0, 0).unwrap();
            il.emit(&opcodes::RET).unwrap();
            module.bake(&caller, il).unwrap();

            let mut il = module.il_stream(&callee).unwrap();
            il.emit(&opcodes::RET).unwrap();
            module.bake(&callee, il).unwrap();

            module.create_type(&ty).unwrap();
            let mut total = 0usize;
            module
                .commit(&mut |_method: Token, body: &[u8]| {
                    total += body.len();
                    Ok(())
                })
                .unwrap();
            black_box(total)
        });
    });
}

criterion_group!(
    benches,
    // Assembly
    bench_assemble_straight_line,
    bench_assemble_forward_branches,
    bench_assemble_switch_table,
    // Encoding
    bench_encode_tiny_body,
    bench_encode_fat_body,
    // Container lifecycle
    bench_define_and_create_types,
    bench_full_commit,
);
criterion_main!(benches);
