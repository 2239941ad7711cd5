use std::fs::File;
use std::os::fd::AsRawFd;

/// `MEMGETBADBLOCK` from `<mtd/mtd-abi.h>`: `_IOW('M', 11, __kernel_loff_t)`.
pub const MEMGETBADBLOCK: libc::c_ulong = 0x4008_4D0B;

/// Whether the erase block at `offset` is marked bad.
///
/// Files that are not MTD devices reject the ioctl; those blocks count as good.
pub fn is_bad_block(file: &File, offset: u64) -> bool {
    let mut offs = offset as libc::loff_t;
    // SAFETY: `offs` is a live loff_t the ioctl reads from.
    let rc = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            MEMGETBADBLOCK as _,
            &mut offs as *mut libc::loff_t,
        )
    };
    rc > 0
}
