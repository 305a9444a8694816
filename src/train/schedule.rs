/// Step decay: the learning rate is multiplied by `gamma` every `step_size`
/// epochs.
#[derive(Debug, Clone, PartialEq)]
pub struct StepLr {
    base_lr: f64,
    step_size: usize,
    gamma: f64,
    epoch: usize,
}

impl StepLr {
    pub fn new(base_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            base_lr,
            step_size: step_size.max(1),
            gamma,
            epoch: 0,
        }
    }

    /// Rate for the current epoch.
    pub fn lr(&self) -> f64 {
        self.lr_at(self.epoch)
    }

    pub fn lr_at(&self, epoch: usize) -> f64 {
        self.base_lr * self.gamma.powi((epoch / self.step_size) as i32)
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Advance one epoch.
    pub fn step(&mut self) {
        self.epoch += 1;
    }
}
