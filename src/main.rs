use std::time::Instant;

use adaptive_wave::{
    BoundaryPulse, NullSink, Result, RunSummary, Simulation, SimulationConfig, VtuWriter,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let start = Instant::now();
    match run(SimulationConfig::default()) {
        Ok(summary) => {
            log::info!(
                "Finished {} steps at t = {} on {} cells with {} degrees of freedom",
                summary.final_step,
                summary.final_time,
                summary.n_active_cells,
                summary.n_dofs,
            );
            log::info!("Elapsed time: {} ms", start.elapsed().as_millis());
        }
        Err(e) => {
            eprintln!();
            eprintln!("----------------------------------------------------");
            eprintln!("Exception on processing:");
            eprintln!("{e}");
            eprintln!("Aborting!");
            eprintln!("----------------------------------------------------");
            std::process::exit(1);
        }
    }
}

fn run(config: SimulationConfig) -> Result<RunSummary> {
    let problem = BoundaryPulse::default();
    if config.write_output {
        let writer = VtuWriter::new(&config.output_dir)?;
        Simulation::new(config, problem, writer)?.run()
    } else {
        Simulation::new(config, problem, NullSink)?.run()
    }
}
