// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync, one set per frame in
// flight, reused round-robin.

use anyhow::Result;
use ash::vk;
use std::sync::Arc;

use super::Device;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    device: Arc<Device>,
}

impl FrameSync {
    pub fn new(device: Arc<Device>) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // First wait returns at once

        // Null handles are valid to destroy, so a partial failure still cleans up
        let mut this = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
            device,
        };

        unsafe {
            this.image_available = this.device.device.create_semaphore(&semaphore_info, None)?;
            this.render_finished = this.device.device.create_semaphore(&semaphore_info, None)?;
            this.in_flight_fence = this.device.device.create_fence(&fence_info, None)?;
        }

        Ok(this)
    }

    /// Block until the GPU finished the last submission using this slot
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device
                .device
                .wait_for_fences(&[self.in_flight_fence], true, u64::MAX)?;
        }
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        unsafe {
            self.device.device.reset_fences(&[self.in_flight_fence])?;
        }
        Ok(())
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.image_available, None);
            self.device.device.destroy_semaphore(self.render_finished, None);
            self.device.device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// Which sync slot the next frame uses (0 to frames_in_flight - 1)
#[derive(Debug, Clone, Copy)]
pub struct FrameCounter {
    current: usize,
    frames_in_flight: usize,
}

impl FrameCounter {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames_in_flight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_slots_alternate() {
        let mut counter = FrameCounter::new(2);
        let seen: Vec<usize> = (0..7)
            .map(|_| {
                let slot = counter.current();
                counter.advance();
                slot
            })
            .collect();

        assert_eq!(seen, vec![0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn stays_in_range_over_many_frames() {
        let mut counter = FrameCounter::new(3);
        for frame in 0..10_000 {
            assert_eq!(counter.current(), frame % 3);
            assert!(counter.current() < counter.frames_in_flight());
            counter.advance();
        }
    }

    #[test]
    fn zero_slots_behaves_as_one() {
        let mut counter = FrameCounter::new(0);
        assert_eq!(counter.frames_in_flight(), 1);
        counter.advance();
        assert_eq!(counter.current(), 0);
    }
}
