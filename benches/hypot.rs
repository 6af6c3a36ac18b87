//! Scalar kernel call through the compile cache vs the plain function

use anyhow::Result;
use ufunc_bench::prelude::*;

fn main() -> Result<()> {
    init_tracing();

    let config = BenchConfig::new(100_000, 100)?.with_env_overrides()?;
    let exec = Executor::sequential();

    let mut cmp = Comparison::new("hypot");
    cmp.add(
        Benchmark::new("Time with compiled kernel", config)
            .run(|| exec.call_scalar(&Hypot, (3.0, 4.0)))?,
    );
    cmp.add(
        Benchmark::new("Time without compiled kernel", config).run(|| Ok(hypot(3.0, 4.0)))?,
    );
    cmp.add(Benchmark::new("Time with f64::hypot", config).run(|| Ok(3.0f64.hypot(4.0)))?);

    for line in cmp.lines() {
        println!("{line}");
    }

    let registry = builtin_registry()?;
    println!("{}", registry.info("hypot", exec.cache())?);
    Ok(())
}
