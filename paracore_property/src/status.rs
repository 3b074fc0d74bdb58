// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property status bits and the externally exposed property type mask.

bitflags::bitflags! {
    /// Status bits carried by every property.
    ///
    /// Bit positions are stable. The low bits are runtime status and may be
    /// written through [`PropertyBase::set_status_value`](crate::PropertyBase::set_status_value).
    /// The `PROP_*` bits describe the structural type of the property and are
    /// protected from raw mask writes; they change only through
    /// [`PropertyBase::sync_type`](crate::PropertyBase::sync_type) and
    /// [`PropertyBase::set_dynamic`](crate::PropertyBase::set_dynamic).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PropertyStatus: u32 {
        /// The value changed since the last recompute.
        const TOUCHED = 1 << 0;
        /// The property cannot be changed at all.
        const IMMUTABLE = 1 << 1;
        /// Runtime read-only marker (editors refuse to change it).
        const READ_ONLY = 1 << 2;
        /// Runtime hidden marker (editors do not show it).
        const HIDDEN = 1 << 3;
        /// Runtime transient marker (not saved).
        const TRANSIENT = 1 << 4;
        /// Runtime output marker (changing it does not touch the owner).
        const OUTPUT = 1 << 7;
        /// Runtime marker that changes do not require a recompute.
        const NO_RECOMPUTE = 1 << 11;
        /// The property is in the middle of a notification.
        const BUSY = 1 << 15;

        /// The property was added at runtime.
        const PROP_DYNAMIC = 1 << 21;
        /// The property type is never persisted.
        const PROP_NO_PERSIST = 1 << 22;
        /// The property type never requires a recompute.
        const PROP_NO_RECOMPUTE = 1 << 23;
        /// The property type is read-only.
        const PROP_READ_ONLY = 1 << 24;
        /// The property type is transient.
        const PROP_TRANSIENT = 1 << 25;
        /// The property type is hidden.
        const PROP_HIDDEN = 1 << 26;
        /// The property type is an output.
        const PROP_OUTPUT = 1 << 27;
    }
}

impl PropertyStatus {
    /// Bits that a raw status write can never change.
    pub const PROTECTED: Self = Self::PROP_DYNAMIC
        .union(Self::PROP_NO_RECOMPUTE)
        .union(Self::PROP_READ_ONLY)
        .union(Self::PROP_TRANSIENT)
        .union(Self::PROP_OUTPUT)
        .union(Self::PROP_HIDDEN);

    /// Bits whose change is reported to the owning container.
    pub const SIGNALED: Self = Self::READ_ONLY.union(Self::HIDDEN);

    /// Returns the externally exposed type mask for these status bits.
    #[must_use]
    pub fn property_type(self) -> PropertyType {
        let mut ty = PropertyType::empty();
        ty.set(PropertyType::READ_ONLY, self.contains(Self::PROP_READ_ONLY));
        ty.set(PropertyType::HIDDEN, self.contains(Self::PROP_HIDDEN));
        ty.set(PropertyType::OUTPUT, self.contains(Self::PROP_OUTPUT));
        ty.set(PropertyType::TRANSIENT, self.contains(Self::PROP_TRANSIENT));
        ty.set(
            PropertyType::NO_RECOMPUTE,
            self.contains(Self::PROP_NO_RECOMPUTE),
        );
        ty.set(PropertyType::NO_PERSIST, self.contains(Self::PROP_NO_PERSIST));
        ty
    }
}

bitflags::bitflags! {
    /// Property type mask shared with editors and the scripting layer.
    ///
    /// The values are an interchange format and never change.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PropertyType: u16 {
        /// Read-only property.
        const READ_ONLY = 1;
        /// Not saved with the document.
        const TRANSIENT = 2;
        /// Not shown in editors.
        const HIDDEN = 4;
        /// Changing it does not touch the owner.
        const OUTPUT = 8;
        /// Changing it does not require a recompute.
        const NO_RECOMPUTE = 16;
        /// Not saved at all, not even its declaration.
        const NO_PERSIST = 32;
    }
}

impl PropertyType {
    /// Returns the structural status bits corresponding to this mask.
    #[must_use]
    pub fn status_bits(self) -> PropertyStatus {
        let mut bits = PropertyStatus::empty();
        bits.set(PropertyStatus::PROP_READ_ONLY, self.contains(Self::READ_ONLY));
        bits.set(PropertyStatus::PROP_TRANSIENT, self.contains(Self::TRANSIENT));
        bits.set(PropertyStatus::PROP_HIDDEN, self.contains(Self::HIDDEN));
        bits.set(PropertyStatus::PROP_OUTPUT, self.contains(Self::OUTPUT));
        bits.set(
            PropertyStatus::PROP_NO_RECOMPUTE,
            self.contains(Self::NO_RECOMPUTE),
        );
        bits.set(PropertyStatus::PROP_NO_PERSIST, self.contains(Self::NO_PERSIST));
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions_are_stable() {
        assert_eq!(PropertyStatus::TOUCHED.bits(), 1);
        assert_eq!(PropertyStatus::READ_ONLY.bits(), 4);
        assert_eq!(PropertyStatus::HIDDEN.bits(), 8);
        assert_eq!(PropertyStatus::PROP_DYNAMIC.bits(), 1 << 21);
        assert_eq!(PropertyType::NO_PERSIST.bits(), 32);
    }

    #[test]
    fn type_mask_round_trips_through_status() {
        let ty = PropertyType::READ_ONLY | PropertyType::HIDDEN | PropertyType::NO_PERSIST;
        assert_eq!(ty.status_bits().property_type(), ty);
    }

    #[test]
    fn runtime_bits_do_not_leak_into_type() {
        let status = PropertyStatus::READ_ONLY | PropertyStatus::HIDDEN | PropertyStatus::TOUCHED;
        assert!(status.property_type().is_empty());
    }

    #[test]
    fn no_persist_is_not_protected() {
        assert!(!PropertyStatus::PROTECTED.contains(PropertyStatus::PROP_NO_PERSIST));
        assert!(PropertyStatus::PROTECTED.contains(PropertyStatus::PROP_DYNAMIC));
    }
}
