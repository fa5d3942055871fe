//! Genesis parameters: network policy carried in the first records.
//!
//! The first record of a data store holds a JSON `GenesisParameters`
//! document. After the initial application, only fields listed in the
//! current `AmendableFields` may be changed by later parameter records;
//! everything else is set in stone without a code change.

use serde::{Deserialize, Serialize};

use crate::error::{GenesisError, RecordError};
use crate::owner::{Owner, OwnerType};
use crate::record::{Record, RecordBuilder, RecordLimits, RECORD_DEFAULT_MAX_VALUE_SIZE, RECORD_MAX_SIZE};
use crate::time_sec;
use crate::wharrgarbl::{Wharrgarblr, WHARRGARBL_DEFAULT_MEMORY};
use crate::CancelToken;

/// Network policy embedded in the first records of a data store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GenesisParameters {
    #[serde(skip)]
    initialized: bool,

    /// Name of this network / data store.
    pub name: String,
    /// Contact info for this network (may be empty).
    pub contact: String,
    /// Optional comment.
    pub comment: String,
    /// Opaque credentials of master CAs (empty for a work-only store).
    pub root_certificate_authorities: Vec<String>,
    /// Is a CA-issued certificate required on records?
    pub certificate_required: bool,
    /// Is proof of work required on records?
    pub work_required: bool,
    /// Static key nodes use to confine themselves to this network.
    pub link_key: [u8; 32],
    /// Floor for record timestamps (seconds).
    pub timestamp_floor: u64,
    /// Minimum number of links required for non-genesis records.
    pub record_min_links: u64,
    /// Maximum size of record values.
    pub record_max_value_size: u64,
    /// Maximum size of records.
    pub record_max_size: u64,
    /// Maximum seconds in the future a record may be timestamped.
    pub record_max_forward_time_drift: u64,
    /// JSON field names the genesis owner may amend after initialization.
    pub amendable_fields: Vec<String>,
}

impl GenesisParameters {
    /// Apply a JSON parameter document.
    ///
    /// The first application takes every provided field. Later applications
    /// take only fields named (case-insensitively) in the current
    /// `AmendableFields`; everything else in the document is silently
    /// ignored, as are unknown keys.
    pub fn update(&mut self, json: &[u8]) -> Result<(), GenesisError> {
        if json.is_empty() {
            return Ok(());
        }

        let provided: std::collections::HashMap<String, serde_json::Value> =
            serde_json::from_slice(json)?;
        let incoming: GenesisParameters = serde_json::from_slice(json)?;

        let amendable = self.amendable_fields.clone();
        for key in provided.keys() {
            let skip = self.initialized
                && !amendable.iter().any(|af| af.eq_ignore_ascii_case(key));
            if skip {
                continue;
            }
            match key.to_ascii_lowercase().as_str() {
                "name" => self.name = incoming.name.clone(),
                "contact" => self.contact = incoming.contact.clone(),
                "comment" => self.comment = incoming.comment.clone(),
                "rootcertificateauthorities" => {
                    self.root_certificate_authorities =
                        incoming.root_certificate_authorities.clone()
                }
                "certificaterequired" => self.certificate_required = incoming.certificate_required,
                "workrequired" => self.work_required = incoming.work_required,
                "linkkey" => self.link_key = incoming.link_key,
                "timestampfloor" => self.timestamp_floor = incoming.timestamp_floor,
                "recordminlinks" => self.record_min_links = incoming.record_min_links,
                "recordmaxvaluesize" => {
                    self.record_max_value_size = incoming.record_max_value_size
                }
                "recordmaxsize" => self.record_max_size = incoming.record_max_size,
                "recordmaxforwardtimedrift" => {
                    self.record_max_forward_time_drift = incoming.record_max_forward_time_drift
                }
                "amendablefields" => self.amendable_fields = incoming.amendable_fields.clone(),
                _ => {}
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// The validation limits these parameters imply. Zero-valued size and
    /// drift fields fall back to the crate defaults.
    pub fn limits(&self) -> RecordLimits {
        RecordLimits {
            timestamp_floor: self.timestamp_floor,
            max_forward_time_drift: if self.record_max_forward_time_drift == 0 {
                RecordLimits::default().max_forward_time_drift
            } else {
                self.record_max_forward_time_drift
            },
            min_links: self.record_min_links as usize,
            max_value_size: if self.record_max_value_size == 0 {
                RECORD_DEFAULT_MAX_VALUE_SIZE
            } else {
                self.record_max_value_size as usize
            },
            max_size: if self.record_max_size == 0 {
                RECORD_MAX_SIZE
            } else {
                self.record_max_size as usize
            },
            work_required: self.work_required,
        }
    }

    /// Serialize to the JSON carried in the first record.
    pub fn to_json(&self) -> Result<Vec<u8>, GenesisError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Create the genesis record chain for a new data store.
///
/// The first record carries the parameter JSON; `record_min_links - 1`
/// further empty records follow, each linking to all prior ones, so real
/// records can immediately satisfy the link minimum. Timestamps start at
/// `now` and step one second per record. A fresh owner of `owner_type`
/// signs everything; proof of work is attached iff `work_required`.
pub fn create_genesis_records(
    owner_type: OwnerType,
    params: &GenesisParameters,
) -> Result<(Vec<Record>, Owner), GenesisError> {
    let json = params.to_json()?;
    let owner = Owner::generate(owner_type).map_err(RecordError::from)?;
    let now = time_sec();
    let cancel = CancelToken::new();

    let prover = if params.work_required {
        Some(Wharrgarblr::new(WHARRGARBL_DEFAULT_MEMORY, 0))
    } else {
        None
    };
    let build = |builder: RecordBuilder| -> Result<Record, RecordError> {
        match &prover {
            Some(wg) => builder.work_and_sign(&owner, wg, &cancel),
            None => builder.sign(&owner),
        }
    };

    let mut records = Vec::new();
    let mut links = Vec::new();

    let first = build(RecordBuilder::new(now).value(json))?;
    links.push(first.hash());
    records.push(first);

    for i in 1..params.record_min_links {
        let rec = build(RecordBuilder::new(now + i).links(links.iter().copied()))?;
        links.push(rec.hash());
        records.push(rec);
    }

    Ok((records, owner))
}
