use std::path::Path;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use formulary::advanced::{formula_class, install_body, parse, translate_statements};
use formulary::{FormulaLoader, render_instructions};

const JQ: &str = include_str!("../tests/fixtures/jq.rb");
const LIBYAML: &str = include_str!("../tests/fixtures/libyaml.rb");

/// An install method of repeated typical steps.
fn large_recipe() -> String {
    let step = "    system \"./configure\", \"--prefix=#{prefix}\", *std_configure_args\n    bin.install \"tool\" if build.with? \"tool\"\n    inreplace \"Makefile\" do |s|\n      s.gsub! \"-O2\", \"-O3\"\n    end\n";
    format!(
        "class Large < Formula\n  url \"https://x/large-1.0.tar.gz\"\n  def install\n{}  end\nend\n",
        step.repeat(500)
    )
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_jq", |b| b.iter(|| parse(black_box(JQ)).unwrap()));
    c.bench_function("parse_libyaml", |b| {
        b.iter(|| parse(black_box(LIBYAML)).unwrap())
    });
}

fn bench_translate(c: &mut Criterion) {
    let source = large_recipe();
    let recipe = parse(&source).unwrap();
    let class = formula_class(recipe.program()).unwrap();
    let body = install_body(class).unwrap();

    c.bench_function("translate_large_install", |b| {
        b.iter(|| translate_statements(black_box(&recipe), black_box(body)).unwrap())
    });
}

fn bench_load_and_render(c: &mut Criterion) {
    let loader = FormulaLoader::new();
    let path = Path::new("libyaml.rb");

    c.bench_function("load_and_render_libyaml", |b| {
        b.iter(|| {
            let record = loader.load_source(path, black_box(LIBYAML)).unwrap();
            render_instructions(record.install.as_deref().unwrap_or_default())
        })
    });
}

criterion_group!(hot_paths, bench_parse, bench_translate, bench_load_and_render);
criterion_main!(hot_paths);
