use super::types::PlanResult;

/// Plans produced during one session, oldest first. Results are never edited
/// or removed; only the cursor moves.
#[derive(Debug, Clone, Default)]
pub struct PlanSession {
    current_index: usize,
    plans: Vec<PlanResult>,
}

impl PlanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `plan`, points the cursor at it and returns its index.
    pub fn push(&mut self, plan: PlanResult) -> usize {
        self.plans.push(plan);
        self.current_index = self.plans.len() - 1;
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn plans(&self) -> &[PlanResult] {
        &self.plans
    }

    pub fn current_index(&self) -> Option<usize> {
        if self.plans.is_empty() {
            None
        } else {
            Some(self.current_index)
        }
    }

    pub fn current(&self) -> Option<&PlanResult> {
        self.plans.get(self.current_index)
    }

    pub fn next_plan(&mut self) -> Option<&PlanResult> {
        if self.plans.is_empty() {
            return None;
        }
        self.current_index = (self.current_index + 1) % self.plans.len();
        self.current()
    }

    pub fn previous_plan(&mut self) -> Option<&PlanResult> {
        if self.plans.is_empty() {
            return None;
        }
        let len = self.plans.len();
        self.current_index = (self.current_index + len - 1) % len;
        self.current()
    }
}
