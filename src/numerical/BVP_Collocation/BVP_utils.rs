use log::info;
use nalgebra::DVector;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tabled::{builder::Builder, settings::Style};

pub fn elapsed_time(elapsed: Duration) -> (String, f64) {
    let time = elapsed.as_millis();
    if time < 1000 {
        info!("Elapsed {} ms", time);
        (" ms ".to_string(), time as f64)
    } else if time < 60_000 {
        info!("Elapsed {} s", elapsed.as_secs());
        (" s".to_string(), elapsed.as_secs() as f64)
    } else if time < 3600_000 {
        info!("Elapsed {} min", elapsed.as_secs() / 60);
        (" min".to_string(), elapsed.as_secs() as f64 / 60.0)
    } else {
        info!("Elapsed {} h", elapsed.as_secs() / 3600);
        (" h".to_string(), elapsed.as_secs() as f64 / 3600.0)
    }
}

/// Accumulates the time spent in residual evaluation, Jacobian evaluation and the block linear solver
#[derive(Debug, Clone)]
pub struct CustomTimer {
    pub start: Instant,
    pub jac_time: Instant,
    pub jac: Duration,
    pub fun_time: Instant,
    pub fun: Duration,
    pub linear_system_time: Instant,
    pub linear_system: Duration,
}

impl CustomTimer {
    pub fn new() -> CustomTimer {
        CustomTimer {
            start: Instant::now(),
            jac_time: Instant::now(),
            jac: Duration::from_secs(0),
            fun_time: Instant::now(),
            fun: Duration::from_secs(0),
            linear_system_time: Instant::now(),
            linear_system: Duration::from_secs(0),
        }
    }
    pub fn jac_tic(&mut self) {
        self.jac_time = Instant::now();
    }
    pub fn jac_tac(&mut self) {
        self.jac += self.jac_time.elapsed();
    }
    pub fn fun_tic(&mut self) {
        self.fun_time = Instant::now();
    }
    pub fn fun_tac(&mut self) {
        self.fun += self.fun_time.elapsed();
    }
    pub fn linear_system_tic(&mut self) {
        self.linear_system_time = Instant::now();
    }
    pub fn linear_system_tac(&mut self) {
        self.linear_system += self.linear_system_time.elapsed();
    }

    /// share of every section in the total time; logged as a table
    pub fn get_all(&self) -> HashMap<String, String> {
        let mut timer_data: HashMap<String, String> = HashMap::new();
        let total = self.start.elapsed();
        let total_time = total.as_nanos() as f64;
        let total_time_string = elapsed_time(total);
        timer_data.insert(
            "time elapsed, ".to_string() + total_time_string.0.as_str(),
            format!("{}", total_time_string.1),
        );

        let mut accounted = 0.0;
        for (name, section) in [
            ("Jacobian", self.jac),
            ("Function", self.fun),
            ("Linear System", self.linear_system),
        ] {
            let section_time = section.as_nanos() as f64;
            accounted += section_time;
            let percent = 100.0 * section_time / total_time;
            if percent > 0.5 {
                let section_string = elapsed_time(section);
                timer_data.insert(
                    format!("{} (%, {})", name, section_string.0),
                    format!("{}, {}", (percent * 1000.0).round() / 1000.0, section_string.1),
                );
            }
        }
        let other_percent = 100.0 * (total_time - accounted) / total_time;
        if other_percent > 0.5 {
            timer_data.insert(
                "other %".to_string(),
                format!("{} ", (other_percent * 1000.0).round() / 1000.0),
            );
        }
        let mut table = Builder::from(timer_data.clone()).build();
        table.with(Style::modern_rounded());
        info!("\n \n TIMER DATA \n \n {}", table.to_string());
        timer_data
    }
}

impl Default for CustomTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders counters like "number of iterations" as a table
pub fn statistics_table(stats: &HashMap<String, usize>) -> String {
    let mut table = Builder::from(stats.clone()).build();
    table.with(Style::modern_rounded());
    table.to_string()
}

/// largest |entry| over all blocks
pub fn max_abs(blocks: &[DVector<f64>]) -> f64 {
    blocks.iter().map(|block| block.amax()).fold(0.0, f64::max)
}

/// true if any entry of any block has |entry| > tol (NaN counts as exceeding)
pub fn exceeds_tolerance(blocks: &[DVector<f64>], tol: f64) -> bool {
    blocks
        .iter()
        .any(|block| block.iter().any(|v| !(v.abs() <= tol)))
}
