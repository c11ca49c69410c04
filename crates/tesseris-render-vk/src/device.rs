// SPDX-License-Identifier: CEPL-1.0
//! Presentation surface, adapter selection and the logical device.
use crate::error::{OpContext, VkError, VkResult};
use crate::instance::VulkanInstance;
use ash::khr::{portability_subset, surface, swapchain};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::c_char;
use tracing::{debug, info};

/// The window binding. Created once, never recreated.
pub struct Surface {
    loader: surface::Instance,
    handle: vk::SurfaceKHR,
}

impl Surface {
    fn new(
        instance: &VulkanInstance,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
    ) -> VkResult<Self> {
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();
        let handle = unsafe {
            ash_window::create_surface(instance.entry(), instance.raw(), dh, wh, None)
        }
        .op("vkCreateSurfaceKHR")?;
        let loader = surface::Instance::new(instance.entry(), instance.raw());
        Ok(Self { loader, handle })
    }

    pub fn loader(&self) -> &surface::Instance {
        &self.loader
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Per-family capability flags of one adapter, in family-index order.
#[derive(Clone, Debug, Default)]
pub struct AdapterQueues {
    pub graphics: Vec<bool>,
    pub present: Vec<bool>,
}

/// First adapter with a family doing both graphics and present; failing
/// that, the first adapter with any graphics family and any present family.
pub fn select_adapter(adapters: &[AdapterQueues]) -> Option<(usize, QueueFamilies)> {
    let same_family = adapters.iter().enumerate().find_map(|(a, q)| {
        q.graphics
            .iter()
            .zip(&q.present)
            .position(|(&g, &p)| g && p)
            .map(|i| (a, QueueFamilies { graphics: i as u32, present: i as u32 }))
    });
    same_family.or_else(|| {
        adapters.iter().enumerate().find_map(|(a, q)| {
            let graphics = q.graphics.iter().position(|&g| g)?;
            let present = q.present.iter().position(|&p| p)?;
            Some((
                a,
                QueueFamilies {
                    graphics: graphics as u32,
                    present: present as u32,
                },
            ))
        })
    })
}

/// Adapter, logical device and queues. Owns the surface and instance, which
/// are released after the device.
pub struct GpuContext {
    device: ash::Device,
    swapchain_loader: Option<swapchain::Device>,
    physical: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    surface: Option<Surface>,
    instance: VulkanInstance,
}

impl GpuContext {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> VkResult<Self> {
        let instance = VulkanInstance::new(Some(display.display_handle()?.as_raw()), validation)?;
        let surface = Surface::new(&instance, window, display)?;
        Self::build(instance, Some(surface))
    }

    /// A context without a surface or swapchain support, for offscreen work
    /// and tests. Graphics and present share one queue.
    pub fn headless(validation: bool) -> VkResult<Self> {
        let instance = VulkanInstance::new(None, validation)?;
        Self::build(instance, None)
    }

    fn build(instance: VulkanInstance, surface: Option<Surface>) -> VkResult<Self> {
        let raw = instance.raw();
        let adapters = unsafe { raw.enumerate_physical_devices() }.op("vkEnumeratePhysicalDevices")?;

        let mut queues = Vec::with_capacity(adapters.len());
        for &pd in &adapters {
            let families = unsafe { raw.get_physical_device_queue_family_properties(pd) };
            let graphics: Vec<bool> = families
                .iter()
                .map(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .collect();
            let present = match &surface {
                Some(s) => (0..families.len() as u32)
                    .map(|i| unsafe {
                        s.loader
                            .get_physical_device_surface_support(pd, i, s.handle)
                            .unwrap_or(false)
                    })
                    .collect(),
                None => graphics.clone(),
            };

            let props = unsafe { raw.get_physical_device_properties(pd) };
            info!(
                "adapter {:?} ({:?}): graphics families {:?}, present families {:?}",
                props.device_name_as_c_str().unwrap_or_default(),
                props.device_type,
                indices(&graphics),
                indices(&present),
            );
            queues.push(AdapterQueues { graphics, present });
        }

        let (chosen, families) = select_adapter(&queues).ok_or(VkError::NoSuitableAdapter)?;
        let physical = adapters[chosen];
        let properties = unsafe { raw.get_physical_device_properties(physical) };
        let memory_properties = unsafe { raw.get_physical_device_memory_properties(physical) };

        let available = unsafe { raw.enumerate_device_extension_properties(physical) }
            .op("vkEnumerateDeviceExtensionProperties")?;
        let mut extensions: Vec<*const c_char> = Vec::new();
        if surface.is_some() {
            extensions.push(swapchain::NAME.as_ptr());
        }
        if available
            .iter()
            .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == portability_subset::NAME))
        {
            extensions.push(portability_subset::NAME.as_ptr());
        }

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let device_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            ..Default::default()
        };
        let device =
            unsafe { raw.create_device(physical, &device_info, None) }.op("vkCreateDevice")?;

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = surface
            .as_ref()
            .map(|_| swapchain::Device::new(raw, &device));

        info!(
            "using {:?}: graphics family {}, present family {} (shared={})",
            properties.device_name_as_c_str().unwrap_or_default(),
            families.graphics,
            families.present,
            families.shared()
        );
        debug!("device extensions enabled: {}", extensions.len());

        Ok(Self {
            device,
            swapchain_loader,
            physical,
            properties,
            memory_properties,
            families,
            graphics_queue,
            present_queue,
            surface,
            instance,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    pub fn physical(&self) -> vk::PhysicalDevice {
        self.physical
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn families(&self) -> QueueFamilies {
        self.families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn surface(&self) -> VkResult<&Surface> {
        self.surface.as_ref().ok_or(VkError::NoSurface)
    }

    pub fn swapchain_loader(&self) -> VkResult<&swapchain::Device> {
        self.swapchain_loader.as_ref().ok_or(VkError::NoSurface)
    }

    pub fn device_name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn supports_format_features(
        &self,
        format: vk::Format,
        features: vk::FormatFeatureFlags,
    ) -> bool {
        let props = unsafe {
            self.instance
                .raw()
                .get_physical_device_format_properties(self.physical, format)
        };
        props.optimal_tiling_features.contains(features)
    }

    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }.op("vkDeviceWaitIdle")
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
        }
    }
}

fn indices(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect()
}
