use std::path::Path;

use anyhow::Context;

use schedbench_core::matrix::{MatrixSpec, generate};

pub fn genconf(total_cpus: u64, vnodes_per_mom: u32, output: Option<&Path>) -> anyhow::Result<()> {
    let spec = MatrixSpec {
        total_cpus,
        vnodes_per_mom,
        ..Default::default()
    };
    let json = generate(&spec).to_json_string()?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("✓ Generated {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
