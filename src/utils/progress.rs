/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A minimal progress logger for the compression pipeline's long-running
//! passes (dictionary build, RePair digram/monogram replacement, pruning).

use log::info;
use std::time::{Duration, Instant};

pub struct ProgressLogger {
    name: String,
    start: Instant,
    next_log_time: Instant,
    log_interval: Duration,
    count: usize,
}

impl ProgressLogger {
    const LIGHT_UPDATE_MASK: usize = (1 << 12) - 1;

    pub fn new<S: ToString>(name: S) -> Self {
        let now = Instant::now();
        ProgressLogger {
            name: name.to_string(),
            start: now,
            next_log_time: now,
            log_interval: Duration::from_secs(10),
            count: 0,
        }
    }

    pub fn start(&mut self) {
        self.start = Instant::now();
        self.next_log_time = self.start + self.log_interval;
        info!("{}: starting", self.name);
    }

    fn maybe_log(&mut self) {
        let now = Instant::now();
        if self.next_log_time <= now {
            info!(
                "{}: {} items, {:.2}s elapsed",
                self.name,
                self.count,
                self.start.elapsed().as_secs_f64()
            );
            self.next_log_time = now + self.log_interval;
        }
    }

    /// Cheaper than [`Self::update`]: only checks the clock once every few
    /// thousand calls.
    pub fn light_update(&mut self) {
        self.count += 1;
        if self.count & Self::LIGHT_UPDATE_MASK == 0 {
            self.maybe_log();
        }
    }

    pub fn update(&mut self) {
        self.count += 1;
        self.maybe_log();
    }

    pub fn done(&self) {
        info!(
            "{}: done, {} items in {:.2}s",
            self.name,
            self.count,
            self.start.elapsed().as_secs_f64()
        );
    }
}
