//! Benchmarks for statement generation on the request path.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use lexdata_core::catalog;
use lexdata_core::crud::{self, ListQuery};
use lexdata_core::filter::{Filter, OrderBy};
use lexdata_core::pagination::Pagination;
use lexdata_core::tenant::{SchemaNaming, TenantId};
use lexdata_core::{Identifier, Record, SqlTemplate, Value};

fn bench_templates(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");
    let schema = Identifier::new("tenant_acme").unwrap();
    let sql = "SELECT p.*, e.title FROM ${schema}.publications p \
               JOIN ${schema}.estimates e ON e.user_id = p.user_id WHERE p.user_id = $1";

    group.bench_function("parse", |b| b.iter(|| black_box(SqlTemplate::parse(sql).unwrap())));

    let template = SqlTemplate::parse(sql).unwrap();
    group.bench_function("render", |b| b.iter(|| black_box(template.render(&schema))));

    let naming = SchemaNaming::default();
    let tenant = TenantId::new("Acme-Legal.01");
    group.bench_function("schema_for", |b| {
        b.iter(|| black_box(naming.schema_for(&tenant).unwrap()))
    });

    group.finish();
}

fn bench_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("crud");
    let publications = catalog::publications().unwrap();

    let record = Record::new()
        .set("user_id", "user-1")
        .set("oab_number", "SP123456")
        .set("publication_date", "2024-03-01")
        .set("content", "Intimação para audiência")
        .set("source", "Codilo")
        .set("external_id", "ext-1");
    group.bench_function("insert", |b| {
        b.iter(|| black_box(crud::insert(&publications, &record).unwrap()))
    });

    let owners = Record::new().set("user_id", "user-1");
    let patch = Record::new()
        .set("status", "atribuida")
        .set("responsavel", "Maria")
        .set("observacoes", Value::Null);
    let id = Value::from("publication_1");
    group.bench_function("update", |b| {
        b.iter(|| black_box(crud::update(&publications, &id, &owners, &patch).unwrap()))
    });

    let query = ListQuery::new()
        .filter(Filter::eq("user_id", "user-1"))
        .filter(Filter::Or(vec![
            Filter::eq("status", "nova"),
            Filter::eq("status", "pendente"),
        ]))
        .filter(Filter::search(["content", "process_number"], "audiência"))
        .order_by(OrderBy::desc("publication_date"))
        .page(Pagination::new(3, 25));
    group.bench_function("list", |b| {
        b.iter(|| black_box(crud::list(&publications, &query).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_templates, bench_crud);
criterion_main!(benches);
