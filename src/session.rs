use chrono::{DateTime, Local};

/// Which of the two label registries a category belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Category {
    Site,
    Outlet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    Running,
    Stopped,
}

/// Ordered, de-duplicated, append-only list of labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryRegistry {
    labels: Vec<String>,
}

impl CategoryRegistry {
    pub fn new<I, S>(defaults: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for label in defaults {
            registry.insert(label.into());
        }
        registry
    }

    /// Appends `label` unless it is already present (case-sensitive).
    /// Returns true if the registry grew.
    pub fn insert(&mut self, label: String) -> bool {
        if self.contains(&label) {
            return false;
        }
        self.labels.push(label);
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

/// The single mutable aggregate behind a counting session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub success: u64,
    pub fail: u64,
    pub running: bool,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
    pub site: Option<String>,
    pub outlet: Option<String>,
    pub sites: CategoryRegistry,
    pub outlets: CategoryRegistry,
}

impl SessionState {
    pub fn new(sites: CategoryRegistry, outlets: CategoryRegistry) -> Self {
        Self {
            sites,
            outlets,
            ..Self::default()
        }
    }

    pub fn total(&self) -> u64 {
        self.success + self.fail
    }

    pub fn phase(&self) -> Phase {
        match (self.running, self.started_at, self.ended_at) {
            (true, _, _) => Phase::Running,
            (false, Some(_), Some(_)) => Phase::Stopped,
            _ => Phase::Idle,
        }
    }

    pub fn start(&mut self, now: DateTime<Local>) -> bool {
        if self.running {
            return false;
        }
        self.started_at = Some(now);
        self.ended_at = None;
        self.running = true;
        true
    }

    pub fn finish(&mut self, now: DateTime<Local>) -> bool {
        if !self.running {
            return false;
        }
        // a clock stepping backwards must not produce a negative session
        let ended = match self.started_at {
            Some(started) if now < started => started,
            _ => now,
        };
        self.ended_at = Some(ended);
        self.running = false;
        true
    }

    /// Zeroes counters and timestamps in place. Labels are kept.
    pub fn reset(&mut self) {
        self.success = 0;
        self.fail = 0;
        self.running = false;
        self.started_at = None;
        self.ended_at = None;
    }

    pub fn record_success(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.success += 1;
        true
    }

    pub fn record_fail(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.fail += 1;
        true
    }

    pub fn registry(&self, kind: Category) -> &CategoryRegistry {
        match kind {
            Category::Site => &self.sites,
            Category::Outlet => &self.outlets,
        }
    }

    pub fn selection(&self, kind: Category) -> Option<&str> {
        match kind {
            Category::Site => self.site.as_deref(),
            Category::Outlet => self.outlet.as_deref(),
        }
    }

    /// Registers `label` if new and selects it. Blank labels are rejected.
    pub fn choose(&mut self, kind: Category, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() {
            return false;
        }
        let (registry, selection) = match kind {
            Category::Site => (&mut self.sites, &mut self.site),
            Category::Outlet => (&mut self.outlets, &mut self.outlet),
        };
        registry.insert(label.to_string());
        *selection = Some(label.to_string());
        true
    }
}
