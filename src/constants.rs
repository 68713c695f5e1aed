//! Global constants for the vdi-collector application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Memory and buffer size constants
/// Default chunk size for streaming evidence files into the workspace (1MB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Read buffer used by the host-directory filesystem view (64KB)
pub const HOST_READ_BUFFER_SIZE: usize = 64 * 1024;

// Partition selection constants
/// Default logical sector size for partition table arithmetic
pub const DEFAULT_SECTOR_SIZE: u64 = 512;

/// Partitions smaller than this many sectors are never probed (1GB at 512 byte sectors)
pub const DEFAULT_MIN_PARTITION_SECTORS: u64 = 2 * 1024 * 1024;

/// Root directory names that mark a Windows system partition
pub const DEFAULT_OS_MARKERS: &[&str] = &["windows", "users"];

/// MBR boot signature found at offset 510
pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// MBR partition type used by a GPT protective MBR
pub const MBR_TYPE_GPT_PROTECTIVE: u8 = 0xEE;

/// GPT header signature at LBA 1
pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";

/// Upper bound on GPT entries we are willing to read
pub const GPT_MAX_ENTRIES: u32 = 1024;

/// Upper bound on a single GPT entry size
pub const GPT_MAX_ENTRY_SIZE: usize = 4096;

/// Smallest sector size a partition table is read with
pub const MIN_SECTOR_SIZE: u64 = 512;

// Virtual disk constants
/// Size of the VHD footer at the end of every VHD file
pub const VHD_FOOTER_SIZE: u64 = 512;

/// VHD footer cookie
pub const VHD_FOOTER_COOKIE: &[u8; 8] = b"conectix";

/// VHD dynamic header cookie
pub const VHD_DYNAMIC_COOKIE: &[u8; 8] = b"cxsparse";

/// Block allocation table entry for a block that was never written
pub const VHD_UNALLOCATED_BLOCK: u32 = 0xFFFF_FFFF;

// Path resolution constants
/// Directory listing entries under Users that never belong to a human profile
pub const PROFILE_ALIASES: &[&str] = &[".", "..", "Public", "All Users", "Default", "Default User"];

/// Label recorded for targets that do not belong to a specific user profile
pub const SYSTEM_USER_LABEL: &str = "System";

/// Prefix used by NTFS metadata files that are never copied during a directory walk
pub const RESERVED_NAME_PREFIX: char = '$';

/// Suffix appended to destination files until the copy completes
pub const PARTIAL_FILE_SUFFIX: &str = ".partial";

// Identity correlation constants
/// Time value rendered for identities that only appear in the profile list
pub const NO_LOG_FOUND: &str = "No Log Found";

/// Placeholder for identity fields that no source provided
pub const UNKNOWN_VALUE: &str = "Unknown";

/// Placeholder for a missing logon type
pub const NO_LOGON_TYPE: &str = "-";

/// Domain name reported by built-in system principals
pub const SYSTEM_AUTHORITY_DOMAIN: &str = "NT AUTHORITY";

/// Suffix of machine and managed service account names
pub const MACHINE_ACCOUNT_SUFFIX: char = '$';

/// SID prefixes of accounts that can belong to a human user
pub const ACCEPTED_SID_PREFIXES: &[&str] = &["S-1-5-21-", "S-1-12-1-"];

/// Profile folders owned by service accounts
pub const SERVICE_PROFILE_FOLDERS: &[&str] = &["systemprofile", "LocalService", "NetworkService"];

/// Successful logon event identifier in the Security log
pub const LOGON_SUCCESS_EVENT_ID: u64 = 4624;

/// Timestamp layout used in the identity table
pub const IDENTITY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Byte order mark prepended to CSV exports for spreadsheet compatibility
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// Default file names
pub const DEFAULT_WORKSPACE_ROOT: &str = "workspace";
pub const DEFAULT_IDENTITY_CSV: &str = "identity_table.csv";
pub const DEFAULT_SUMMARY_NAME: &str = "collection_summary.json";
pub const DEFAULT_LOG_NAME: &str = "vdi_collector.log";

/// Written into each volume workspace so later correlation reuses the batch volume id
pub const VOLUME_ID_FILE: &str = "volume_id.txt";

/// Workspace locations probed for identity sources after extraction
pub const WORKSPACE_SECURITY_EVTX: &str = "Windows_System32_winevt_Logs/Security.evtx";
pub const WORKSPACE_LOGON_CSV: &str = "logon_events.csv";
pub const WORKSPACE_PROFILE_CSV: &str = "profile_list.csv";

/// Upper bound on worker threads when the configuration does not specify one
pub const MAX_DEFAULT_WORKERS: usize = 4;
