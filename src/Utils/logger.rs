use crate::numerical::BVP_Collocation::BVP_errors::{BvpError, check_shape};
use crate::numerical::BVP_Collocation::solver_config::SolverConfig;
use chrono::Local;
use csv::Writer;
use nalgebra::DVector;
use simplelog::*;
use std::fs::File;
use std::path::Path;

/// Installs a terminal logger (and a `log_<date>.txt` file logger if `config.log_to_file`)
/// with the level of `config.loglevel`. Does nothing if no level is configured; if a logger
/// is already installed it is kept.
pub fn init_logger(config: &SolverConfig) -> Result<(), BvpError> {
    let Some(log_option) = config.level_filter()? else {
        return Ok(());
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        log_option,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    if config.log_to_file {
        let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let name = format!("log_{}.txt", date_and_time);
        loggers.push(WriteLogger::new(log_option, Config::default(), File::create(name)?));
    }
    // Err only means that a logger is already set
    let _ = CombinedLogger::init(loggers);
    Ok(())
}

/// Writes the trajectory as csv: header `arg, headers...`, then one row `t, x_1..x_P` per mesh point
pub fn save_trajectory_to_csv<P: AsRef<Path>>(
    mesh: &[f64],
    trajectory: &[DVector<f64>],
    arg: &str,
    headers: &[String],
    filename: P,
) -> Result<(), BvpError> {
    check_shape("trajectory", (headers.len(), mesh.len()), (headers.len(), trajectory.len()))?;
    for x in trajectory {
        check_shape("trajectory", (headers.len(), 1), x.shape())?;
    }
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    let mut headers_with_x = Vec::with_capacity(headers.len() + 1);
    headers_with_x.push(arg.to_string());
    headers_with_x.extend(headers.iter().cloned());
    writer.write_record(&headers_with_x)?;

    for (t, x) in mesh.iter().zip(trajectory.iter()) {
        let mut row_data = Vec::with_capacity(x.len() + 1);
        row_data.push(t.to_string());
        row_data.extend(x.iter().map(|val| val.to_string()));
        writer.write_record(&row_data)?;
    }
    writer.flush()?;
    Ok(())
}
