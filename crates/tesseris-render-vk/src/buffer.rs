// SPDX-License-Identifier: CEPL-1.0
use crate::device::GpuContext;
use crate::error::{OpContext, VkError, VkResult};
use crate::memory;
use ash::vk;
use std::ffi::c_void;
use tracing::trace;

/// Rejects writes that would leave `[0, capacity)`.
pub fn check_bounds(offset: u64, len: u64, capacity: u64) -> VkResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(VkError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}

/// A buffer with its own allocation, optionally persistently mapped.
pub struct GpuBuffer {
    device: ash::Device,
    handle: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: *mut c_void,
}

impl GpuBuffer {
    pub fn create(
        ctx: &GpuContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        flags: vk::MemoryPropertyFlags,
    ) -> VkResult<Self> {
        if size == 0 {
            return Err(VkError::InvalidArgument("buffer size must be non-zero"));
        }
        let device = ctx.device();
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let handle = unsafe { device.create_buffer(&info, None) }.op("vkCreateBuffer")?;
        let mut buf = Self {
            device: device.clone(),
            handle,
            memory: vk::DeviceMemory::null(),
            size,
            mapped: std::ptr::null_mut(),
        };

        let req = unsafe { device.get_buffer_memory_requirements(handle) };
        buf.memory = memory::allocate(ctx, req, flags)?;
        unsafe { device.bind_buffer_memory(handle, buf.memory, 0) }.op("vkBindBufferMemory")?;
        trace!("buffer {size} bytes, {usage:?}, {flags:?}");
        Ok(buf)
    }

    /// Host-visible, coherent buffer initialised with `data`.
    pub fn with_data(ctx: &GpuContext, usage: vk::BufferUsageFlags, data: &[u8]) -> VkResult<Self> {
        let mut buf = Self::create(
            ctx,
            data.len() as vk::DeviceSize,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buf.update(0, data)?;
        Ok(buf)
    }

    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn is_mapped(&self) -> bool {
        !self.mapped.is_null()
    }

    /// Maps the whole allocation until [`unmap`](Self::unmap). Mapping twice
    /// is a no-op.
    pub fn map(&mut self) -> VkResult<()> {
        if self.is_mapped() {
            return Ok(());
        }
        self.mapped = unsafe {
            self.device
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
        }
        .op("vkMapMemory")?;
        Ok(())
    }

    pub fn unmap(&mut self) {
        if self.is_mapped() {
            unsafe { self.device.unmap_memory(self.memory) };
            self.mapped = std::ptr::null_mut();
        }
    }

    /// Copies `data` to `offset`. Out-of-range writes are refused before
    /// any memory is touched.
    pub fn update(&mut self, offset: vk::DeviceSize, data: &[u8]) -> VkResult<()> {
        check_bounds(offset, data.len() as u64, self.size)?;
        if data.is_empty() {
            return Ok(());
        }
        if self.is_mapped() {
            unsafe {
                let dst = (self.mapped as *mut u8).add(offset as usize);
                std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
            }
            return Ok(());
        }
        unsafe {
            let ptr = self
                .device
                .map_memory(
                    self.memory,
                    offset,
                    data.len() as vk::DeviceSize,
                    vk::MemoryMapFlags::empty(),
                )
                .op("vkMapMemory")?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Reads back `len` bytes at `offset` from host-visible memory.
    pub fn read(&mut self, offset: vk::DeviceSize, len: usize) -> VkResult<Vec<u8>> {
        check_bounds(offset, len as u64, self.size)?;
        let mut out = vec![0u8; len];
        if len == 0 {
            return Ok(out);
        }
        unsafe {
            if self.is_mapped() {
                let src = (self.mapped as *const u8).add(offset as usize);
                std::ptr::copy_nonoverlapping(src, out.as_mut_ptr(), len);
            } else {
                let ptr = self
                    .device
                    .map_memory(
                        self.memory,
                        offset,
                        len as vk::DeviceSize,
                        vk::MemoryMapFlags::empty(),
                    )
                    .op("vkMapMemory")?;
                std::ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), len);
                self.device.unmap_memory(self.memory);
            }
        }
        Ok(out)
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle == vk::Buffer::null()
    }

    pub fn destroy(&mut self) {
        self.unmap();
        unsafe {
            if self.handle != vk::Buffer::null() {
                self.device.destroy_buffer(self.handle, None);
                self.handle = vk::Buffer::null();
            }
            if self.memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.memory, None);
                self.memory = vk::DeviceMemory::null();
            }
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// One-shot `size`-byte copy through a transient command buffer. Blocks
/// until `queue` is idle.
pub fn copy_buffer(
    ctx: &GpuContext,
    pool: vk::CommandPool,
    queue: vk::Queue,
    src: &GpuBuffer,
    dst: &GpuBuffer,
    size: vk::DeviceSize,
) -> VkResult<()> {
    check_bounds(0, size, src.size())?;
    check_bounds(0, size, dst.size())?;
    let device = ctx.device();

    let alloc = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: 1,
        ..Default::default()
    };
    let cmd = unsafe { device.allocate_command_buffers(&alloc) }.op("vkAllocateCommandBuffers")?[0];

    let result = (|| -> VkResult<()> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe {
            device
                .begin_command_buffer(cmd, &begin)
                .op("vkBeginCommandBuffer")?;
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            device.cmd_copy_buffer(cmd, src.handle(), dst.handle(), std::slice::from_ref(&region));
            device.end_command_buffer(cmd).op("vkEndCommandBuffer")?;

            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                ..Default::default()
            };
            device
                .queue_submit(queue, std::slice::from_ref(&submit), vk::Fence::null())
                .op("vkQueueSubmit")?;
            device.queue_wait_idle(queue).op("vkQueueWaitIdle")
        }
    })();

    unsafe { device.free_command_buffers(pool, std::slice::from_ref(&cmd)) };
    result
}
