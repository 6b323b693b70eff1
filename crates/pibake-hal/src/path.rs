//! Partition naming conventions for block devices.

/// Partition device path for `disk` and a 1-based partition number.
///
/// Loop, NVMe and mmcblk style devices name partitions with a `p` infix
/// (`/dev/loop0p1`, `/dev/mmcblk0p2`); plain SCSI/SATA style devices append
/// the bare digit (`/dev/sda1`).
pub fn partition_path(disk: &str, num: u32) -> String {
    if uses_p_suffix(disk) {
        format!("{}p{}", disk, num)
    } else {
        format!("{}{}", disk, num)
    }
}

fn uses_p_suffix(disk: &str) -> bool {
    disk.contains("loop") || disk.contains("nvme") || disk.contains("mmcblk")
}
