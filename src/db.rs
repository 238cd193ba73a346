//! LMDB-backed grant storage

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};
use heed::types::{Bytes, Str, U64};
use heed::{BoxedError, BytesDecode, BytesEncode, Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::keys::{build_key, row_key, split_pair_key, split_row_key};
use crate::storage::{Grant, GrantStorage, Via};

const NEXT_GRANT_ID: &str = "next_grant_id";

/// Stored half of a grant row; the fingerprints and id live in the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowValue {
    grants: u64,
    created_at: u64,
}

/// `[grants BE][created_at BE]`, 16 bytes
enum RowCodec {}

impl<'a> BytesEncode<'a> for RowCodec {
    type EItem = RowValue;

    fn bytes_encode(item: &'a RowValue) -> std::result::Result<Cow<'a, [u8]>, BoxedError> {
        let mut buf = [0u8; 16];
        BigEndian::write_u64(&mut buf[..8], item.grants);
        BigEndian::write_u64(&mut buf[8..], item.created_at);
        Ok(Cow::Owned(buf.to_vec()))
    }
}

impl<'a> BytesDecode<'a> for RowCodec {
    type DItem = RowValue;

    fn bytes_decode(bytes: &'a [u8]) -> std::result::Result<RowValue, BoxedError> {
        if bytes.len() != 16 {
            return Err(format!("grant row value has {} bytes, expected 16", bytes.len()).into());
        }
        Ok(RowValue {
            grants: BigEndian::read_u64(&bytes[..8]),
            created_at: BigEndian::read_u64(&bytes[8..]),
        })
    }
}

type RowDb = Database<Bytes, RowCodec>;
type PairDb = Database<Bytes, U64<BigEndian>>;

/// Forward and reverse row index: fwd[a,b,id] and rev[b,a,id] stay in sync
struct BiRows {
    fwd: RowDb,
    rev: RowDb,
}

impl BiRows {
    fn put(&self, tx: &mut RwTxn, a: &str, b: &str, id: u64, v: &RowValue) -> Result<()> {
        self.fwd.put(tx, &row_key(a, b, id), v)?;
        self.rev.put(tx, &row_key(b, a, id), v)?;
        Ok(())
    }

    fn del(&self, tx: &mut RwTxn, a: &str, b: &str, id: u64) -> Result<bool> {
        let r = self.fwd.delete(tx, &row_key(a, b, id))?;
        self.rev.delete(tx, &row_key(b, a, id))?;
        Ok(r)
    }

    /// Rows under a prefix of `db`, as `(first, second, id, value)` with owned parts
    fn scan(tx: &RoTxn, db: &RowDb, prefix: &[u8]) -> Result<Vec<(String, String, u64, RowValue)>> {
        let mut r = Vec::new();
        for item in db.prefix_iter(tx, prefix)? {
            let (k, v) = item?;
            if let Some((a, b, id)) = split_row_key(k) {
                r.push((a.to_string(), b.to_string(), id, v));
            }
        }
        Ok(r)
    }
}

/// Forward and reverse membership index: fwd[group,member], rev[member,group]
struct BiPairs {
    fwd: PairDb,
    rev: PairDb,
}

impl BiPairs {
    fn scan(tx: &RoTxn, db: &PairDb, first: &str) -> Result<Vec<String>> {
        let mut r = Vec::new();
        for item in db.prefix_iter(tx, &build_key(&[first]))? {
            let (k, _) = item?;
            if let Some((_, second)) = split_pair_key(k) {
                r.push(second.to_string());
            }
        }
        Ok(r)
    }
}

struct Tables {
    rows: BiRows,
    members: BiPairs,
    meta: Database<Str, U64<BigEndian>>,
}

/// Grant rows and memberships in an LMDB environment.
///
/// Every mutating call runs in one write transaction; readers see a
/// consistent snapshot and never a half-written row.
pub struct LmdbStorage {
    env: Env,
    tables: Tables,
    path: PathBuf,
}

impl LmdbStorage {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_readers(config.max_readers)
                .max_dbs(5)
                .open(&config.path)?
        };
        let mut tx = env.write_txn()?;
        let tables = Tables {
            rows: BiRows {
                fwd: env.create_database(&mut tx, Some("grants"))?,
                rev: env.create_database(&mut tx, Some("grants_by_actor"))?,
            },
            members: BiPairs {
                fwd: env.create_database(&mut tx, Some("members"))?,
                rev: env.create_database(&mut tx, Some("member_of"))?,
            },
            meta: env.create_database(&mut tx, Some("meta"))?,
        };
        tx.commit()?;
        info!(path = %config.path.display(), "grant store opened");
        Ok(Self {
            env,
            tables,
            path: config.path.clone(),
        })
    }

    /// Open with default settings at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&StoreConfig::new(path.as_ref()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop every row and membership.
    pub fn clear(&self) -> Result<()> {
        self.write(|t, tx| {
            t.rows.fwd.clear(tx)?;
            t.rows.rev.clear(tx)?;
            t.members.fwd.clear(tx)?;
            t.members.rev.clear(tx)?;
            t.meta.clear(tx)?;
            Ok(())
        })
    }

    fn read<T, F: FnOnce(&Tables, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.env.read_txn()?;
        f(&self.tables, &tx)
    }

    fn write<T, F: FnOnce(&Tables, &mut RwTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = self.env.write_txn()?;
        let r = f(&self.tables, &mut tx)?;
        tx.commit()?;
        Ok(r)
    }
}

fn to_grant(target: &str, actor: &str, id: u64, v: RowValue) -> Result<Grant> {
    Ok(Grant {
        id,
        target: Fingerprint::parse(target)?,
        actor: Fingerprint::parse(actor)?,
        grants: v.grants,
        created_at: v.created_at,
    })
}

fn fingerprints(raw: Vec<String>) -> Result<Vec<Fingerprint>> {
    raw.iter().map(|s| Fingerprint::parse(s)).collect()
}

/// Delete every row found under `prefix` of the forward (or reverse) table
fn delete_scanned(t: &Tables, tx: &mut RwTxn, prefix: &[u8], reverse: bool) -> Result<usize> {
    let db = if reverse { &t.rows.rev } else { &t.rows.fwd };
    let found = BiRows::scan(tx, db, prefix)?;
    let mut n = 0;
    for (a, b, id, _) in found {
        let (target, actor) = if reverse { (b, a) } else { (a, b) };
        if t.rows.del(tx, &target, &actor, id)? {
            n += 1;
        }
    }
    Ok(n)
}

impl GrantStorage for LmdbStorage {
    fn insert(&self, target: &Fingerprint, actor: &Fingerprint, grants: u64, created_at: u64) -> Result<Grant> {
        let id = self.write(|t, tx| {
            let id = t.meta.get(tx, NEXT_GRANT_ID)?.unwrap_or(1);
            t.meta.put(tx, NEXT_GRANT_ID, &(id + 1))?;
            t.rows.put(tx, target.as_str(), actor.as_str(), id, &RowValue { grants, created_at })?;
            Ok(id)
        })?;
        Ok(Grant {
            id,
            target: target.clone(),
            actor: actor.clone(),
            grants,
            created_at,
        })
    }

    fn delete_pair(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<usize> {
        let prefix = build_key(&[target.as_str(), actor.as_str()]);
        self.write(|t, tx| delete_scanned(t, tx, &prefix, false))
    }

    fn by_pair(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<Vec<Grant>> {
        let prefix = build_key(&[target.as_str(), actor.as_str()]);
        self.read(|t, tx| {
            BiRows::scan(tx, &t.rows.fwd, &prefix)?
                .into_iter()
                .map(|(a, b, id, v)| to_grant(&a, &b, id, v))
                .collect()
        })
    }

    fn by_target(&self, target: &Fingerprint) -> Result<Vec<Grant>> {
        let prefix = build_key(&[target.as_str()]);
        self.read(|t, tx| {
            BiRows::scan(tx, &t.rows.fwd, &prefix)?
                .into_iter()
                .map(|(a, b, id, v)| to_grant(&a, &b, id, v))
                .collect()
        })
    }

    fn by_actor(&self, actor: &Fingerprint) -> Result<Vec<Grant>> {
        let prefix = build_key(&[actor.as_str()]);
        self.read(|t, tx| {
            BiRows::scan(tx, &t.rows.rev, &prefix)?
                .into_iter()
                .map(|(a, b, id, v)| to_grant(&b, &a, id, v))
                .collect()
        })
    }

    fn purge(&self, entity: &Fingerprint) -> Result<usize> {
        let prefix = build_key(&[entity.as_str()]);
        let n = self.write(|t, tx| {
            let mut n = delete_scanned(t, tx, &prefix, false)?;
            n += delete_scanned(t, tx, &prefix, true)?;
            for member in BiPairs::scan(tx, &t.members.fwd, entity.as_str())? {
                t.members.fwd.delete(tx, &build_key(&[entity.as_str(), &member]))?;
                t.members.rev.delete(tx, &build_key(&[&member, entity.as_str()]))?;
            }
            for group in BiPairs::scan(tx, &t.members.rev, entity.as_str())? {
                t.members.fwd.delete(tx, &build_key(&[&group, entity.as_str()]))?;
                t.members.rev.delete(tx, &build_key(&[entity.as_str(), &group]))?;
            }
            Ok(n)
        })?;
        debug!(entity = %entity, rows = n, "purged");
        Ok(n)
    }

    fn add_member(&self, group: &Fingerprint, member: &Fingerprint, created_at: u64) -> Result<bool> {
        let fwd = build_key(&[group.as_str(), member.as_str()]);
        let rev = build_key(&[member.as_str(), group.as_str()]);
        self.write(|t, tx| {
            if t.members.fwd.get(tx, &fwd)?.is_some() {
                return Ok(false);
            }
            t.members.fwd.put(tx, &fwd, &created_at)?;
            t.members.rev.put(tx, &rev, &created_at)?;
            Ok(true)
        })
    }

    fn remove_member(&self, group: &Fingerprint, member: &Fingerprint) -> Result<bool> {
        let fwd = build_key(&[group.as_str(), member.as_str()]);
        let rev = build_key(&[member.as_str(), group.as_str()]);
        self.write(|t, tx| {
            let r = t.members.fwd.delete(tx, &fwd)?;
            t.members.rev.delete(tx, &rev)?;
            Ok(r)
        })
    }

    fn groups_of(&self, member: &Fingerprint) -> Result<Vec<Fingerprint>> {
        fingerprints(self.read(|t, tx| BiPairs::scan(tx, &t.members.rev, member.as_str()))?)
    }

    fn members_of(&self, group: &Fingerprint) -> Result<Vec<Fingerprint>> {
        fingerprints(self.read(|t, tx| BiPairs::scan(tx, &t.members.fwd, group.as_str()))?)
    }

    fn held_masks(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<Vec<(Via, u64)>> {
        self.read(|t, tx| {
            let direct = build_key(&[target.as_str(), actor.as_str()]);
            let mut held: Vec<(Via, u64)> = BiRows::scan(tx, &t.rows.fwd, &direct)?
                .into_iter()
                .map(|(_, _, _, v)| (Via::Direct, v.grants))
                .collect();
            for group in BiPairs::scan(tx, &t.members.rev, actor.as_str())? {
                let prefix = build_key(&[target.as_str(), &group]);
                let rows = BiRows::scan(tx, &t.rows.fwd, &prefix)?;
                if rows.is_empty() {
                    continue;
                }
                let via = Via::Group(Fingerprint::parse(&group)?);
                held.extend(rows.into_iter().map(|(_, _, _, v)| (via.clone(), v.grants)));
            }
            Ok(held)
        })
    }
}
