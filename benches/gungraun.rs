use gungraun::{library_benchmark, library_benchmark_group, main};

mod runner;

use runner::ParsedScript;

fn setup(source_str: &str) -> ParsedScript {
    ParsedScript::new(source_str, true)
}

macro_rules! bench_harness {
    ($($ID:ident : $name:literal,)*) => {
        $(
            mod $ID {
                pub(super) static CODE: &str = include_str!(concat!("scripts/", $name));
            }
        )*

        #[library_benchmark]
        $(#[bench::$ID($ID::CODE)])*
        fn bench_parse(script: &str) {
            let mut parser = parser::parser::Parser::new(script).unwrap();
            parser.parse_program().unwrap();
        }

        #[library_benchmark(setup=setup)]
        $(#[bench::$ID($ID::CODE)])*
        fn bench_exec(script: ParsedScript) {
            script.run();
        }
    };
}

bench_harness!(
    fib : "fibonacci.js",
    for_loop : "for_loop.js",
    array_access : "array_access.js",
    object_property_access : "object_property_access.js",
    closure_capture : "closure_capture.js",
);

library_benchmark_group!(
   name = bench_parse_group;
   benchmarks = bench_parse
);

library_benchmark_group!(
   name = bench_exec_group;
   benchmarks = bench_exec
);

main!(library_benchmark_groups = bench_exec_group);
