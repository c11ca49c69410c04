// SPDX-License-Identifier: CEPL-1.0
use crate::device::GpuContext;
use crate::error::{OpContext, VkError, VkResult};
use ash::vk;

/// Lowest memory type whose bit is set in `type_bits` and whose flags
/// include all of `flags`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    props
        .memory_types_as_slice()
        .iter()
        .enumerate()
        .find(|(i, ty)| type_bits & (1 << i) != 0 && ty.property_flags.contains(flags))
        .map(|(i, _)| i as u32)
}

/// Allocates memory for `req` from the first matching type.
pub(crate) fn allocate(
    ctx: &GpuContext,
    req: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> VkResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(ctx.memory_properties(), req.memory_type_bits, flags)
        .ok_or(VkError::NoMemoryType {
            type_bits: req.memory_type_bits,
            flags,
        })?;
    let info = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index,
        ..Default::default()
    };
    unsafe { ctx.device().allocate_memory(&info, None) }.op("vkAllocateMemory")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut p = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in p.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        p
    }

    const LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn picks_lowest_matching_index() {
        let p = props(&[LOCAL, HOST, HOST | LOCAL]);
        assert_eq!(find_memory_type(&p, 0b111, HOST), Some(1));
        assert_eq!(find_memory_type(&p, 0b111, LOCAL), Some(0));
    }

    #[test]
    fn respects_the_type_filter() {
        let p = props(&[LOCAL, HOST, HOST | LOCAL]);
        assert_eq!(find_memory_type(&p, 0b100, HOST), Some(2));
        assert_eq!(find_memory_type(&p, 0b110, LOCAL), Some(2));
    }

    #[test]
    fn flags_must_be_a_superset() {
        let p = props(&[vk::MemoryPropertyFlags::HOST_VISIBLE, LOCAL]);
        assert_eq!(find_memory_type(&p, 0b11, HOST), None);
    }

    #[test]
    fn empty_request_matches_first_allowed_type() {
        let p = props(&[LOCAL, HOST]);
        assert_eq!(find_memory_type(&p, 0b10, vk::MemoryPropertyFlags::empty()), Some(1));
    }

    #[test]
    fn types_past_the_count_are_ignored() {
        let mut p = props(&[LOCAL]);
        p.memory_types[1].property_flags = HOST;
        assert_eq!(find_memory_type(&p, u32::MAX, HOST), None);
    }
}
