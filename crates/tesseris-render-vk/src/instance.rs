// SPDX-License-Identifier: CEPL-1.0
//! Loader, instance and the optional validation messenger.
use crate::error::{OpContext, VkResult};
use ash::ext::debug_utils;
use ash::{khr, vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, c_void, CStr};
use tracing::{debug, error, info, trace, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    let msg = unsafe { data.as_ref().and_then(|d| d.message_as_c_str()) }
        .map(CStr::to_string_lossy)
        .unwrap_or_default();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan {types:?}] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan {types:?}] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!("[vulkan {types:?}] {msg}");
    } else {
        trace!("[vulkan {types:?}] {msg}");
    }
    vk::FALSE
}

/// Validation callback registration, owned by the instance that created it.
struct DebugMessenger {
    loader: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    fn new(entry: &Entry, instance: &Instance) -> VkResult<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let handle = unsafe { loader.create_debug_utils_messenger(&ci, None) }
            .op("vkCreateDebugUtilsMessengerEXT")?;
        Ok(Self { loader, handle })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.handle, None)
        };
    }
}

fn has_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available
        .iter()
        .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == name))
}

pub struct VulkanInstance {
    debug: Option<DebugMessenger>,
    instance: Instance,
    entry: Entry,
    portability: bool,
}

impl VulkanInstance {
    /// `display` selects the window-system extensions; `None` creates an
    /// instance that can only be used headless.
    pub fn new(display: Option<RawDisplayHandle>, validation: bool) -> VkResult<Self> {
        let entry = unsafe { Entry::load()? };

        let available = unsafe { entry.enumerate_instance_extension_properties(None) }
            .op("vkEnumerateInstanceExtensionProperties")?;
        let layers = unsafe { entry.enumerate_instance_layer_properties() }
            .op("vkEnumerateInstanceLayerProperties")?;

        let mut extensions: Vec<*const c_char> = match display {
            Some(dh) => ash_window::enumerate_required_extensions(dh)
                .op("vkEnumerateInstanceExtensionProperties")?
                .to_vec(),
            None => Vec::new(),
        };

        let validation = validation && {
            let layer_ok = layers
                .iter()
                .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER));
            let ext_ok = has_extension(&available, debug_utils::NAME);
            if !(layer_ok && ext_ok) {
                warn!("validation requested but {VALIDATION_LAYER:?} is not installed; continuing without it");
            }
            layer_ok && ext_ok
        };
        if validation {
            extensions.push(debug_utils::NAME.as_ptr());
        }

        let portability = has_extension(&available, khr::portability_enumeration::NAME);
        let mut flags = vk::InstanceCreateFlags::empty();
        if portability {
            extensions.push(khr::portability_enumeration::NAME.as_ptr());
            if has_extension(&available, khr::get_physical_device_properties2::NAME) {
                extensions.push(khr::get_physical_device_properties2::NAME.as_ptr());
            }
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: c"tesseris".as_ptr(),
            application_version: vk::make_api_version(0, 0, 1, 0),
            p_engine_name: c"tesseris".as_ptr(),
            engine_version: vk::make_api_version(0, 0, 1, 0),
            api_version: vk::API_VERSION_1_0,
            ..Default::default()
        };

        let layer_names = [VALIDATION_LAYER.as_ptr()];
        let enabled_layers: &[*const c_char] = if validation { &layer_names } else { &[] };

        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            flags,
            p_application_info: &app_info,
            enabled_layer_count: enabled_layers.len() as u32,
            pp_enabled_layer_names: enabled_layers.as_ptr(),
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            ..Default::default()
        };

        let instance =
            unsafe { entry.create_instance(&create_info, None) }.op("vkCreateInstance")?;

        let debug = if validation {
            match DebugMessenger::new(&entry, &instance) {
                Ok(m) => Some(m),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let validation_on = debug.is_some();
        info!(
            "vulkan instance ready (validation={}, portability={}, {} extensions)",
            validation_on,
            portability,
            extensions.len()
        );

        Ok(Self {
            debug,
            instance,
            entry,
            portability,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn raw(&self) -> &Instance {
        &self.instance
    }

    pub fn validation_enabled(&self) -> bool {
        self.debug.is_some()
    }

    pub fn portability(&self) -> bool {
        self.portability
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        self.debug = None;
        unsafe { self.instance.destroy_instance(None) };
    }
}
