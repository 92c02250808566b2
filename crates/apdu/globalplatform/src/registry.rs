//! Registry entries returned by GET STATUS
//!
//! Each entry is a constructed `E3` node. The parsers below take the response
//! data (status word excluded) and return one value per entry, in card order.
//! A listing that did not fit one response arrives as several payloads, the
//! earlier ones answered with `63 10`; the `*_pages` parsers join them first.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    Error, Result,
    constants::tags,
    privileges::Privileges,
    tlv::{self, Tlv, TlvSearch},
};

/// Issuer security domain status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerSecurityDomain {
    /// AID of the security domain
    pub aid: Bytes,
    /// Card life cycle state
    pub life_cycle: u8,
    /// Privileges
    pub privileges: Privileges,
}

/// Application or security domain status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// AID of the application
    pub aid: Bytes,
    /// Application life cycle state
    pub life_cycle: u8,
    /// Privileges
    pub privileges: Privileges,
    /// Executable load file the application was installed from
    pub executable_load_file_aid: Option<Bytes>,
    /// Associated security domain
    pub associated_security_domain_aid: Option<Bytes>,
}

/// Executable load file status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFileInfo {
    /// AID of the load file
    pub aid: Bytes,
    /// Load file life cycle state
    pub life_cycle: u8,
    /// Load file version number
    pub version: Option<Bytes>,
    /// Associated security domain
    pub associated_security_domain_aid: Option<Bytes>,
    /// Executable modules, when queried with modules
    pub modules: Vec<Bytes>,
}

/// Parse the issuer security domain entry
pub fn parse_issuer_security_domain(data: &[u8]) -> Result<IssuerSecurityDomain> {
    let nodes = tlv::parse(data)?;
    let fields = entry_fields(nodes.single(tags::REGISTRY_ENTRY)?)?;

    Ok(IssuerSecurityDomain {
        aid: aid(fields)?,
        life_cycle: life_cycle(fields)?,
        privileges: privileges(fields)?,
    })
}

/// Parse application entries
pub fn parse_applications(data: &[u8]) -> Result<Vec<ApplicationInfo>> {
    let nodes = tlv::parse(data)?;
    nodes
        .all_with_tag(tags::REGISTRY_ENTRY)
        .into_iter()
        .map(|entry| {
            let fields = entry_fields(entry)?;
            Ok(ApplicationInfo {
                aid: aid(fields)?,
                life_cycle: life_cycle(fields)?,
                privileges: privileges(fields)?,
                executable_load_file_aid: optional(fields, tags::EXECUTABLE_LOAD_FILE_AID)?,
                associated_security_domain_aid: optional(
                    fields,
                    tags::ASSOCIATED_SECURITY_DOMAIN_AID,
                )?,
            })
        })
        .collect()
}

/// Parse executable load file entries
pub fn parse_executable_load_files(data: &[u8]) -> Result<Vec<LoadFileInfo>> {
    let nodes = tlv::parse(data)?;
    nodes
        .all_with_tag(tags::REGISTRY_ENTRY)
        .into_iter()
        .map(|entry| {
            let fields = entry_fields(entry)?;
            Ok(LoadFileInfo {
                aid: aid(fields)?,
                life_cycle: life_cycle(fields)?,
                version: optional(fields, tags::EXECUTABLE_LOAD_FILE_VERSION)?,
                associated_security_domain_aid: optional(
                    fields,
                    tags::ASSOCIATED_SECURITY_DOMAIN_AID,
                )?,
                modules: fields
                    .all_with_tag(tags::EXECUTABLE_MODULE_AID)
                    .into_iter()
                    .map(Tlv::value_bytes)
                    .collect(),
            })
        })
        .collect()
}

/// Parse application entries spread over several GET STATUS responses
pub fn parse_application_pages<I>(pages: I) -> Result<Vec<ApplicationInfo>>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    parse_applications(&join_pages(pages))
}

/// Parse executable load file entries spread over several GET STATUS responses
pub fn parse_executable_load_file_pages<I>(pages: I) -> Result<Vec<LoadFileInfo>>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    parse_executable_load_files(&join_pages(pages))
}

/// Concatenate response payloads in the order they were received
pub fn join_pages<I>(pages: I) -> Bytes
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut joined = BytesMut::new();
    for page in pages {
        joined.put_slice(page.as_ref());
    }
    joined.freeze()
}

fn entry_fields(entry: &Tlv) -> Result<&[Tlv]> {
    entry
        .children()
        .ok_or(Error::InvalidFormat("registry entry is not constructed"))
}

fn aid(fields: &[Tlv]) -> Result<Bytes> {
    fields
        .single_or_none(tags::AID)?
        .map(Tlv::value_bytes)
        .ok_or(Error::InvalidFormat("registry entry without AID"))
}

fn life_cycle(fields: &[Tlv]) -> Result<u8> {
    fields
        .single_or_none(tags::LIFE_CYCLE_STATE)?
        .and_then(|node| node.value_bytes().first().copied())
        .ok_or(Error::InvalidFormat("registry entry without life cycle state"))
}

fn privileges(fields: &[Tlv]) -> Result<Privileges> {
    match fields.single_or_none(tags::PRIVILEGES)? {
        Some(node) => Privileges::from_bytes(&node.value_bytes()),
        None => Ok(Privileges::empty()),
    }
}

fn optional(fields: &[Tlv], tag: &[u8]) -> Result<Option<Bytes>> {
    Ok(fields.single_or_none(tag)?.map(Tlv::value_bytes))
}
