//! Contact classification and the per-session contact directory.

use std::collections::HashMap;

use crate::protocol::ContactRecord;

/// Verify-flag bit marking official (public) accounts.
const PUBLIC_ACCOUNT_FLAG: i64 = 0x08;

/// Classification bucket for one contact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Group chat (`@@` username prefix).
    Group,
    /// Official/public account (verify flag bit 3).
    Public,
    /// Personal contact (`@` username prefix).
    Contact,
    /// Matches no classification rule; kept in the member map only.
    Other,
}

/// Classify a record. The rules are checked in order and are therefore
/// disjoint: group prefix, then public flag, then contact prefix.
pub fn classify(record: &ContactRecord) -> ContactKind {
    if record.user_name.starts_with("@@") {
        ContactKind::Group
    } else if record.verify_flag & PUBLIC_ACCOUNT_FLAG != 0 {
        ContactKind::Public
    } else if record.user_name.starts_with('@') {
        ContactKind::Contact
    } else {
        ContactKind::Other
    }
}

/// Classified contact cache owned by one session.
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    groups: Vec<ContactRecord>,
    public_accounts: Vec<ContactRecord>,
    contacts: Vec<ContactRecord>,
    members: HashMap<String, ContactRecord>,
}

impl ContactDirectory {
    /// Rebuild the directory from a freshly fetched member list, replacing
    /// all previous buckets and the member map.
    pub fn rebuild(&mut self, member_list: Vec<ContactRecord>) {
        self.groups.clear();
        self.public_accounts.clear();
        self.contacts.clear();
        self.members.clear();

        for member in member_list {
            self.members
                .insert(member.user_name.clone(), member.clone());
            match classify(&member) {
                ContactKind::Group => self.groups.push(member),
                ContactKind::Public => self.public_accounts.push(member),
                ContactKind::Contact => self.contacts.push(member),
                ContactKind::Other => {}
            }
        }
    }

    /// Insert or replace a single record in the member map without
    /// reclassifying (used for the session's own user record).
    pub fn insert_member(&mut self, record: ContactRecord) {
        self.members.insert(record.user_name.clone(), record);
    }

    /// Look up a member by username.
    pub fn member(&self, user_name: &str) -> Option<&ContactRecord> {
        self.members.get(user_name)
    }

    /// Group chat bucket.
    pub fn groups(&self) -> &[ContactRecord] {
        &self.groups
    }

    /// Official-account bucket (cached, withheld from external responses).
    pub fn public_accounts(&self) -> &[ContactRecord] {
        &self.public_accounts
    }

    /// Personal contact bucket.
    pub fn contacts(&self) -> &[ContactRecord] {
        &self.contacts
    }

    /// Total number of known members, bucketed or not.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Classified buckets returned to callers. Official accounts are computed
/// and cached but withheld from the external response by policy.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ContactBuckets {
    /// Group chats.
    #[serde(rename = "groupMembers")]
    pub groups: Vec<ContactRecord>,
    /// Personal contacts.
    #[serde(rename = "contacts")]
    pub contacts: Vec<ContactRecord>,
}
