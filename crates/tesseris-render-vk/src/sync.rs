// SPDX-License-Identifier: CEPL-1.0
use crate::error::{OpContext, VkResult};
use ash::vk;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    TimedOut,
}

/// The single set of frame sync objects: two semaphores for GPU ordering
/// and one fence for the CPU. The fence starts signaled.
pub struct FrameSync {
    device: ash::Device,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

impl FrameSync {
    pub fn create(device: &ash::Device) -> VkResult<Self> {
        let mut sync = Self {
            device: device.clone(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };
        let sem_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        unsafe {
            sync.image_available = device.create_semaphore(&sem_info, None).op("vkCreateSemaphore")?;
            sync.render_finished = device.create_semaphore(&sem_info, None).op("vkCreateSemaphore")?;
            sync.in_flight = device.create_fence(&fence_info, None).op("vkCreateFence")?;
        }
        Ok(sync)
    }

    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available
    }

    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished
    }

    pub fn in_flight(&self) -> vk::Fence {
        self.in_flight
    }

    /// Waits up to `timeout_ns` for the in-flight fence. A timeout is not an
    /// error; anything else from the driver is.
    pub fn wait(&self, timeout_ns: u64) -> VkResult<FenceStatus> {
        match unsafe { self.device.wait_for_fences(&[self.in_flight], true, timeout_ns) } {
            Ok(()) => Ok(FenceStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceStatus::TimedOut),
            Err(e) => Err(e).op("vkWaitForFences"),
        }
    }

    pub fn reset(&self) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[self.in_flight]) }.op("vkResetFences")
    }

    pub fn is_destroyed(&self) -> bool {
        self.in_flight == vk::Fence::null()
    }

    pub fn destroy(&mut self) {
        unsafe {
            for sem in [&mut self.image_available, &mut self.render_finished] {
                if *sem != vk::Semaphore::null() {
                    self.device.destroy_semaphore(*sem, None);
                    *sem = vk::Semaphore::null();
                }
            }
            if self.in_flight != vk::Fence::null() {
                self.device.destroy_fence(self.in_flight, None);
                self.in_flight = vk::Fence::null();
            }
        }
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        self.destroy();
    }
}
