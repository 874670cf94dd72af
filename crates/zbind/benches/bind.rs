use criterion::{criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;
use std::hint::black_box;

use zbind::bind::{Schema, XmlObject};
use zbind::{from_xml, to_xml, xml_object};

#[derive(Debug, Default)]
struct Line {
    sku: String,
    quantity: u32,
    price: f64,
}

impl XmlObject for Line {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .attribute("sku", |l| &l.sku, |l| &mut l.sku)
            .field("quantity", |l| &l.quantity, |l| &mut l.quantity)
            .field("price", |l| &l.price, |l| &mut l.price)
    }
}

xml_object!(Line);

#[derive(Debug, Default)]
struct Order {
    id: u64,
    lines: Vec<Line>,
    notes: BTreeMap<u32, String>,
}

impl XmlObject for Order {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .element_name("order")
            .attribute("id", |o| &o.id, |o| &mut o.id)
            .field("lines", |o| &o.lines, |o| &mut o.lines)
            .renamed("line")
            .wrapped("lines")
            .field("notes", |o| &o.notes, |o| &mut o.notes)
    }
}

fn order(lines: u32) -> Order {
    Order {
        id: 7,
        lines: (0..lines)
            .map(|n| Line {
                sku: format!("sku-{n}"),
                quantity: n,
                price: f64::from(n) * 1.25,
            })
            .collect(),
        notes: (0..lines / 10).map(|n| (n, format!("note {n}"))).collect(),
    }
}

fn bench_serialize(c: &mut Criterion) {
    let order = order(200);
    c.bench_function("zbind_bind_serialize", |b| {
        b.iter(|| to_xml(black_box(&order)))
    });
}

fn bench_deserialize(c: &mut Criterion) {
    if let Ok(xml) = to_xml(&order(200)) {
        c.bench_function("zbind_bind_deserialize", |b| {
            b.iter(|| from_xml::<Order>(black_box(&xml)))
        });
    }
}

criterion_group!(benches, bench_serialize, bench_deserialize);
criterion_main!(benches);
