use std::time::{
    Duration,
    Instant,
};

use log::{
    debug,
    info,
    trace,
};

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    INFO,
    DEBUG,
    TRACE,
}

/// Accumulates wall time for a named stage and reports it through `log`.
pub struct ContextTimer {
    start: Instant,
    name: String,
    level: LogLevel,
    pub cumtime: Duration,
}

impl ContextTimer {
    pub fn new(
        name: &str,
        report_start: bool,
        level: LogLevel,
    ) -> ContextTimer {
        let out = ContextTimer {
            start: Instant::now(),
            name: name.to_string(),
            level,
            cumtime: Duration::new(0, 0),
        };
        if report_start {
            out.log(&format!("Started: '{}'", out.name));
        }
        out
    }

    pub fn reset_start(&mut self) {
        self.start = Instant::now();
    }

    pub fn stop(
        &mut self,
        report: bool,
    ) -> Duration {
        let duration = self.start.elapsed();
        self.cumtime += duration;
        if report {
            self.report();
        }
        duration
    }

    pub fn report(&self) {
        let secs = self.cumtime.as_secs_f64();
        self.log(&format!("Time elapsed in '{}' is: {:.02}s", self.name, secs));
    }

    pub fn start_sub_timer(
        &self,
        name: &str,
    ) -> ContextTimer {
        ContextTimer::new(&format!("{}::{}", self.name, name), false, self.level)
    }

    fn log(
        &self,
        msg: &str,
    ) {
        match self.level {
            LogLevel::INFO => info!("{}", msg),
            LogLevel::DEBUG => debug!("{}", msg),
            LogLevel::TRACE => trace!("{}", msg),
        }
    }
}

pub fn progress_bar(
    len: usize,
    visible: bool,
) -> indicatif::ProgressBar {
    if visible {
        indicatif::ProgressBar::new(len as u64)
    } else {
        indicatif::ProgressBar::hidden()
    }
}

#[cfg(test)]
mod test_timer {
    use super::*;

    #[test]
    fn test_timer_accumulates() {
        let mut timer = ContextTimer::new("outer", false, LogLevel::TRACE);
        let first = timer.stop(false);
        timer.reset_start();
        let second = timer.stop(true);
        assert_eq!(timer.cumtime, first + second);

        let sub = timer.start_sub_timer("inner");
        assert_eq!(sub.name, "outer::inner");
    }
}
