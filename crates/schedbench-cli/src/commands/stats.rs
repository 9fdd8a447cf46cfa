use schedbench_stats::{CycleReport, LogRange, ParseOptions, parse_dir};

use super::StatsArgs;

pub fn stats(args: &StatsArgs) -> anyhow::Result<()> {
    let options = ParseOptions {
        range: LogRange {
            start: args.start,
            end: args.end,
        },
        detailed: args.detailed,
        long_threshold: args.long as f64,
    };
    let log = parse_dir(&args.schedlogs, options)?;
    let report = CycleReport::build(&log, &args.perc);

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", report.render(args.verbose)),
    }
    Ok(())
}
