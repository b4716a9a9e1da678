//! Phases command - List the SDLC phases.

use anyhow::Result;
use clap::Args;

use phaseflow_core::Phase;

#[derive(Args)]
pub struct PhasesArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

fn performer(phase: Phase) -> &'static str {
    match phase {
        Phase::Implementation | Phase::Maintenance => "manual",
        _ => "agent",
    }
}

pub async fn execute(args: PhasesArgs) -> Result<()> {
    if args.json {
        let phases: Vec<_> = Phase::ALL
            .iter()
            .map(|p| {
                serde_json::json!({
                    "phase": p,
                    "performed_by": performer(*p),
                    "requires": p.prerequisite(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&phases)?);
        return Ok(());
    }

    println!("{:<16} {:<10} REQUIRES", "PHASE", "BY");
    for phase in Phase::ALL {
        println!(
            "{:<16} {:<10} {}",
            phase.as_str(),
            performer(phase),
            phase.prerequisite().map_or("-", |p| p.as_str())
        );
    }
    Ok(())
}
