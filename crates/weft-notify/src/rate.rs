// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};

/// Default instant-notification cap per address per calendar day.
pub const DEFAULT_DAILY_CAP: u32 = 1000;

/// Per-address daily counter for instant sends. Counts reset at the UTC
/// date boundary; the window is a calendar day, not a sliding 24 hours.
pub struct RateLimiter {
	cap: u32,
	state: Mutex<State>,
}

struct State {
	day: NaiveDate,
	counts: HashMap<String, u32>,
}

impl RateLimiter {
	pub fn new(cap: u32) -> Self {
		Self {
			cap,
			state: Mutex::new(State {
				day: Utc::now().date_naive(),
				counts: HashMap::new(),
			}),
		}
	}

	/// Records one send attempt for `address` and reports whether it is
	/// within the daily cap.
	pub fn allow(&self, address: &str) -> bool {
		self.allow_on(address, Utc::now().date_naive())
	}

	fn allow_on(&self, address: &str, today: NaiveDate) -> bool {
		let mut state = self.state.lock().unwrap();
		if state.day != today {
			state.day = today;
			state.counts.clear();
		}

		let count = state.counts.entry(address.to_string()).or_insert(0);
		if *count >= self.cap {
			return false;
		}
		*count += 1;
		true
	}
}

impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(DEFAULT_DAILY_CAP)
	}
}
