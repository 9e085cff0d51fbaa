use criterion::{criterion_group, criterion_main, Criterion};
use xmlpp::testing::{new_preprocessor, TestOption};

fn generate_document(items: usize) -> String {
    let mut document = String::from("<Product>\n<?define Version = 1.2.3?>\n");
    for i in 0..items {
        document.push_str(&format!(
            "<?if {i} > 10?><Item Id=\"i{i}\" Version=\"$(var.Version)\"/><?else?><Small/><?endif?>\n"
        ));
    }
    document.push_str("<?foreach Lang in en;fr;de;es?><?include resources.xml?><?endforeach?>\n");
    document.push_str("</Product>\n");
    document
}

pub fn throughput_bench(c: &mut Criterion) {
    let document = generate_document(20000);
    let options = [TestOption::File(
        "resources.xml",
        "<Include><Resource Lang=\"$(var.Lang)\" Build=\"$(fun.AutoVersion($(var.Version)))\"/></Include>",
    )];

    let mut group = c.benchmark_group("throughput");
    group.sample_size(20);
    group.bench_function("conditionals_and_substitution", |b| {
        b.iter(|| {
            let (mut preprocessor, _) = new_preprocessor(&options);
            preprocessor.process_str("bench.xml", &document).unwrap();
        })
    });
}

criterion_group!(benches, throughput_bench);
criterion_main!(benches);
