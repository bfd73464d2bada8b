//! Hexary Merkle-Patricia trie over a keccak-addressed node store.

use crate::{StateError, EMPTY_ROOT};
use primitive_types::H256;
use rlp::{Rlp, RlpStream};
use sha3::{Digest, Keccak256};

/// Read access to persisted trie nodes. A missing node must come back as
/// `Ok(None)`, which the trie turns into `StateError::MissingNode`.
pub trait NodeDatabase {
    /// # Errors
    /// Backend failure.
    fn node(&self, hash: H256) -> Result<Option<Vec<u8>>, StateError>;
}

fn keccak(bytes: &[u8]) -> H256 {
    H256::from_slice(Keccak256::digest(bytes).as_slice())
}

/// A child slot: absent, a hash reference into the store, or a node small
/// enough to live inline in its parent.
#[derive(Clone, Debug)]
enum NodeRef {
    Empty,
    Hash(H256),
    Inline(Box<Node>),
}

#[derive(Clone, Debug)]
enum Node {
    Empty,
    /// Terminal: remaining path nibbles plus the value.
    Leaf { path: Vec<u8>, value: Vec<u8> },
    /// Shared path prefix in front of a single child.
    Extension { path: Vec<u8>, child: NodeRef },
    /// Sixteen children plus an optional value for keys ending here.
    Branch {
        children: Box<[NodeRef; 16]>,
        value: Option<Vec<u8>>,
    },
}

fn empty_children() -> Box<[NodeRef; 16]> {
    Box::new([
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
        NodeRef::Empty,
    ])
}

fn bytes_to_nibbles(key: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(key.len() * 2);
    for byte in key {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    nibbles
}

/// Hex-prefix encoding: pack nibbles into bytes with a flag nibble carrying
/// parity and the leaf marker.
fn hex_prefix_encode(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let odd = nibbles.len() % 2 == 1;
    let mut flag = if is_leaf { 2u8 } else { 0 };
    if odd {
        flag += 1;
    }

    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let mut iter = nibbles.iter();
    if odd {
        out.push((flag << 4) | iter.next().copied().unwrap_or(0));
    } else {
        out.push(flag << 4);
    }
    while let (Some(high), Some(low)) = (iter.next(), iter.next()) {
        out.push((high << 4) | low);
    }
    out
}

fn hex_prefix_decode(encoded: &[u8]) -> Result<(Vec<u8>, bool), StateError> {
    let Some(first) = encoded.first() else {
        return Err(StateError::Corrupted("empty hex-prefix path".into()));
    };
    let flag = first >> 4;
    let is_leaf = flag & 2 != 0;
    let odd = flag & 1 != 0;

    let mut nibbles = Vec::new();
    if odd {
        nibbles.push(first & 0x0f);
    }
    for byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    Ok((nibbles, is_leaf))
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn decode_ref(rlp: &Rlp<'_>) -> Result<NodeRef, StateError> {
    if rlp.is_list() {
        Ok(NodeRef::Inline(Box::new(decode_node(rlp)?)))
    } else {
        let data = rlp
            .data()
            .map_err(|e| StateError::Corrupted(format!("bad node reference: {e}")))?;
        if data.is_empty() {
            Ok(NodeRef::Empty)
        } else if data.len() == 32 {
            Ok(NodeRef::Hash(H256::from_slice(data)))
        } else {
            Err(StateError::Corrupted("node reference of odd length".into()))
        }
    }
}

fn decode_node(rlp: &Rlp<'_>) -> Result<Node, StateError> {
    let corrupted = |e: rlp::DecoderError| StateError::Corrupted(format!("bad trie node: {e}"));

    match rlp.item_count().map_err(corrupted)? {
        2 => {
            let path_bytes: Vec<u8> = rlp.val_at(0).map_err(corrupted)?;
            let (path, is_leaf) = hex_prefix_decode(&path_bytes)?;
            if is_leaf {
                Ok(Node::Leaf {
                    path,
                    value: rlp.val_at(1).map_err(corrupted)?,
                })
            } else {
                Ok(Node::Extension {
                    path,
                    child: decode_ref(&rlp.at(1).map_err(corrupted)?)?,
                })
            }
        }
        17 => {
            let mut children = empty_children();
            for (i, slot) in children.iter_mut().enumerate() {
                *slot = decode_ref(&rlp.at(i).map_err(corrupted)?)?;
            }
            let value_data: Vec<u8> = rlp.val_at(16).map_err(corrupted)?;
            let value = if value_data.is_empty() {
                None
            } else {
                Some(value_data)
            };
            Ok(Node::Branch { children, value })
        }
        _ => Err(StateError::Corrupted("trie node of odd arity".into())),
    }
}

/// A Merkle-Patricia trie rooted at a hash in the node store. Mutations
/// build up in memory; [`Trie::commit`] encodes the changed nodes and
/// returns the new root.
pub struct Trie<'db, D: NodeDatabase + ?Sized> {
    db: &'db D,
    root: Node,
}

impl<'db, D: NodeDatabase + ?Sized> Trie<'db, D> {
    /// Open the trie at `root`.
    ///
    /// # Errors
    /// `MissingNode` when the root is not in the store.
    pub fn new(db: &'db D, root: H256) -> Result<Self, StateError> {
        let root_node = if root == EMPTY_ROOT {
            Node::Empty
        } else {
            load_node(db, root)?
        };
        Ok(Self {
            db,
            root: root_node,
        })
    }

    /// Look up `key`.
    ///
    /// # Errors
    /// `MissingNode` or `Corrupted`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let path = bytes_to_nibbles(key);
        get_at(self.db, &self.root, &path)
    }

    /// Insert `key -> value`. Empty values are not stored; use
    /// [`Trie::remove`].
    ///
    /// # Errors
    /// `MissingNode` or `Corrupted`.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StateError> {
        debug_assert!(!value.is_empty());
        let path = bytes_to_nibbles(key);
        let root = core::mem::replace(&mut self.root, Node::Empty);
        self.root = insert_at(self.db, root, &path, value)?;
        Ok(())
    }

    /// Remove `key` if present.
    ///
    /// # Errors
    /// `MissingNode` or `Corrupted`.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), StateError> {
        let path = bytes_to_nibbles(key);
        let root = core::mem::replace(&mut self.root, Node::Empty);
        self.root = remove_at(self.db, root, &path)?;
        Ok(())
    }

    /// Encode all in-memory nodes, appending `(hash, rlp)` pairs for every
    /// node that must be persisted, and return the new root hash.
    pub fn commit(&self, new_nodes: &mut Vec<(H256, Vec<u8>)>) -> H256 {
        let encoded = encode_node(&self.root, new_nodes);
        if let Node::Empty = self.root {
            return EMPTY_ROOT;
        }
        // The root node is always addressed by hash, regardless of size.
        let hash = keccak(&encoded);
        new_nodes.push((hash, encoded));
        hash
    }

    /// The root hash without collecting nodes.
    #[must_use]
    pub fn root_hash(&self) -> H256 {
        let mut scratch = Vec::new();
        self.commit(&mut scratch)
    }
}

fn load_node<D: NodeDatabase + ?Sized>(db: &D, hash: H256) -> Result<Node, StateError> {
    let bytes = db.node(hash)?.ok_or(StateError::MissingNode(hash))?;
    decode_node(&Rlp::new(&bytes))
}

fn resolve<D: NodeDatabase + ?Sized>(db: &D, node_ref: NodeRef) -> Result<Node, StateError> {
    match node_ref {
        NodeRef::Empty => Ok(Node::Empty),
        NodeRef::Hash(hash) => load_node(db, hash),
        NodeRef::Inline(node) => Ok(*node),
    }
}

fn get_at<D: NodeDatabase + ?Sized>(
    db: &D,
    node: &Node,
    path: &[u8],
) -> Result<Option<Vec<u8>>, StateError> {
    match node {
        Node::Empty => Ok(None),
        Node::Leaf {
            path: node_path,
            value,
        } => {
            if node_path == path {
                Ok(Some(value.clone()))
            } else {
                Ok(None)
            }
        }
        Node::Extension {
            path: node_path,
            child,
        } => {
            if path.len() >= node_path.len() && path[..node_path.len()] == node_path[..] {
                let child = match child {
                    NodeRef::Empty => return Ok(None),
                    NodeRef::Hash(hash) => load_node(db, *hash)?,
                    NodeRef::Inline(node) => (**node).clone(),
                };
                get_at(db, &child, &path[node_path.len()..])
            } else {
                Ok(None)
            }
        }
        Node::Branch { children, value } => {
            if path.is_empty() {
                Ok(value.clone())
            } else {
                let child = match &children[usize::from(path[0])] {
                    NodeRef::Empty => return Ok(None),
                    NodeRef::Hash(hash) => load_node(db, *hash)?,
                    NodeRef::Inline(node) => (**node).clone(),
                };
                get_at(db, &child, &path[1..])
            }
        }
    }
}

fn insert_at<D: NodeDatabase + ?Sized>(
    db: &D,
    node: Node,
    path: &[u8],
    value: Vec<u8>,
) -> Result<Node, StateError> {
    match node {
        Node::Empty => Ok(Node::Leaf {
            path: path.to_vec(),
            value,
        }),

        Node::Leaf {
            path: leaf_path,
            value: leaf_value,
        } => {
            let common = common_prefix_len(&leaf_path, path);
            if common == leaf_path.len() && common == path.len() {
                return Ok(Node::Leaf {
                    path: leaf_path,
                    value,
                });
            }

            let mut children = empty_children();
            let mut branch_value = None;

            let leaf_rest = &leaf_path[common..];
            if leaf_rest.is_empty() {
                branch_value = Some(leaf_value);
            } else {
                children[usize::from(leaf_rest[0])] = NodeRef::Inline(Box::new(Node::Leaf {
                    path: leaf_rest[1..].to_vec(),
                    value: leaf_value,
                }));
            }

            let new_rest = &path[common..];
            if new_rest.is_empty() {
                branch_value = Some(value);
            } else {
                children[usize::from(new_rest[0])] = NodeRef::Inline(Box::new(Node::Leaf {
                    path: new_rest[1..].to_vec(),
                    value,
                }));
            }

            let branch = Node::Branch {
                children,
                value: branch_value,
            };
            if common == 0 {
                Ok(branch)
            } else {
                Ok(Node::Extension {
                    path: path[..common].to_vec(),
                    child: NodeRef::Inline(Box::new(branch)),
                })
            }
        }

        Node::Extension {
            path: ext_path,
            child,
        } => {
            let common = common_prefix_len(&ext_path, path);
            if common == ext_path.len() {
                let child_node = resolve(db, child)?;
                let new_child = insert_at(db, child_node, &path[common..], value)?;
                return Ok(Node::Extension {
                    path: ext_path,
                    child: NodeRef::Inline(Box::new(new_child)),
                });
            }

            let mut children = empty_children();
            let mut branch_value = None;

            let ext_rest = &ext_path[common..];
            children[usize::from(ext_rest[0])] = if ext_rest.len() == 1 {
                child
            } else {
                NodeRef::Inline(Box::new(Node::Extension {
                    path: ext_rest[1..].to_vec(),
                    child,
                }))
            };

            let new_rest = &path[common..];
            if new_rest.is_empty() {
                branch_value = Some(value);
            } else {
                children[usize::from(new_rest[0])] = NodeRef::Inline(Box::new(Node::Leaf {
                    path: new_rest[1..].to_vec(),
                    value,
                }));
            }

            let branch = Node::Branch {
                children,
                value: branch_value,
            };
            if common == 0 {
                Ok(branch)
            } else {
                Ok(Node::Extension {
                    path: path[..common].to_vec(),
                    child: NodeRef::Inline(Box::new(branch)),
                })
            }
        }

        Node::Branch {
            mut children,
            value: branch_value,
        } => {
            if path.is_empty() {
                return Ok(Node::Branch {
                    children,
                    value: Some(value),
                });
            }
            let index = usize::from(path[0]);
            let child = core::mem::replace(&mut children[index], NodeRef::Empty);
            let child_node = resolve(db, child)?;
            let new_child = insert_at(db, child_node, &path[1..], value)?;
            children[index] = NodeRef::Inline(Box::new(new_child));
            Ok(Node::Branch {
                children,
                value: branch_value,
            })
        }
    }
}

fn remove_at<D: NodeDatabase + ?Sized>(
    db: &D,
    node: Node,
    path: &[u8],
) -> Result<Node, StateError> {
    match node {
        Node::Empty => Ok(Node::Empty),

        Node::Leaf {
            path: leaf_path,
            value,
        } => {
            if leaf_path == path {
                Ok(Node::Empty)
            } else {
                Ok(Node::Leaf {
                    path: leaf_path,
                    value,
                })
            }
        }

        Node::Extension {
            path: ext_path,
            child,
        } => {
            if path.len() >= ext_path.len() && path[..ext_path.len()] == ext_path[..] {
                let child_node = resolve(db, child)?;
                let new_child = remove_at(db, child_node, &path[ext_path.len()..])?;
                Ok(merge_extension(ext_path, new_child))
            } else {
                Ok(Node::Extension {
                    path: ext_path,
                    child,
                })
            }
        }

        Node::Branch {
            mut children,
            value: branch_value,
        } => {
            let branch_value = if path.is_empty() {
                None
            } else {
                let index = usize::from(path[0]);
                let child = core::mem::replace(&mut children[index], NodeRef::Empty);
                let child_node = resolve(db, child)?;
                let new_child = remove_at(db, child_node, &path[1..])?;
                children[index] = match new_child {
                    Node::Empty => NodeRef::Empty,
                    other => NodeRef::Inline(Box::new(other)),
                };
                branch_value
            };

            normalize_branch(db, children, branch_value)
        }
    }
}

/// Collapse an extension over its rewritten child.
fn merge_extension(ext_path: Vec<u8>, child: Node) -> Node {
    match child {
        Node::Empty => Node::Empty,
        Node::Leaf { path, value } => {
            let mut merged = ext_path;
            merged.extend_from_slice(&path);
            Node::Leaf {
                path: merged,
                value,
            }
        }
        Node::Extension { path, child } => {
            let mut merged = ext_path;
            merged.extend_from_slice(&path);
            Node::Extension {
                path: merged,
                child,
            }
        }
        branch @ Node::Branch { .. } => Node::Extension {
            path: ext_path,
            child: NodeRef::Inline(Box::new(branch)),
        },
    }
}

/// After a removal a branch may be left with a single occupant and must
/// collapse, or the trie would no longer be in canonical form.
fn normalize_branch<D: NodeDatabase + ?Sized>(
    db: &D,
    children: Box<[NodeRef; 16]>,
    value: Option<Vec<u8>>,
) -> Result<Node, StateError> {
    let occupied: Vec<usize> = children
        .iter()
        .enumerate()
        .filter(|(_, child)| !matches!(child, NodeRef::Empty))
        .map(|(i, _)| i)
        .collect();

    match (occupied.len(), &value) {
        (0, None) => Ok(Node::Empty),
        (0, Some(_)) => Ok(Node::Leaf {
            path: Vec::new(),
            value: value.expect("checked above"),
        }),
        (1, None) => {
            let index = occupied[0];
            let mut children = children;
            let child = core::mem::replace(&mut children[index], NodeRef::Empty);
            let child_node = resolve(db, child)?;
            Ok(merge_extension(vec![index as u8], child_node))
        }
        _ => Ok(Node::Branch { children, value }),
    }
}

/// Encode a node, pushing hashed children into `new_nodes`, and return its
/// rlp.
fn encode_node(node: &Node, new_nodes: &mut Vec<(H256, Vec<u8>)>) -> Vec<u8> {
    match node {
        Node::Empty => {
            let mut s = RlpStream::new();
            s.append_empty_data();
            s.out().to_vec()
        }
        Node::Leaf { path, value } => {
            let mut s = RlpStream::new_list(2);
            s.append(&hex_prefix_encode(path, true));
            s.append(value);
            s.out().to_vec()
        }
        Node::Extension { path, child } => {
            let mut s = RlpStream::new_list(2);
            s.append(&hex_prefix_encode(path, false));
            append_ref(&mut s, child, new_nodes);
            s.out().to_vec()
        }
        Node::Branch { children, value } => {
            let mut s = RlpStream::new_list(17);
            for child in children.iter() {
                append_ref(&mut s, child, new_nodes);
            }
            match value {
                Some(value) => s.append(value),
                None => s.append_empty_data(),
            };
            s.out().to_vec()
        }
    }
}

fn append_ref(s: &mut RlpStream, node_ref: &NodeRef, new_nodes: &mut Vec<(H256, Vec<u8>)>) {
    match node_ref {
        NodeRef::Empty => {
            s.append_empty_data();
        }
        NodeRef::Hash(hash) => {
            s.append(hash);
        }
        NodeRef::Inline(node) => {
            let encoded = encode_node(node, new_nodes);
            if encoded.len() < 32 {
                s.append_raw(&encoded, 1);
            } else {
                let hash = keccak(&encoded);
                new_nodes.push((hash, encoded));
                s.append(&hash);
            }
        }
    }
}

/// Root of a trie keyed by the rlp of each item's index: the shape used
/// for transaction, receipt and ommer commitments.
pub fn ordered_trie_root<I: IntoIterator<Item = Vec<u8>>>(items: I) -> H256 {
    struct NoDb;
    impl NodeDatabase for NoDb {
        fn node(&self, hash: H256) -> Result<Option<Vec<u8>>, StateError> {
            let _ = hash;
            Ok(None)
        }
    }

    let db = NoDb;
    let mut trie = Trie::new(&db, EMPTY_ROOT).expect("empty trie always opens");
    for (index, item) in items.into_iter().enumerate() {
        let key = rlp::encode(&(index as u64));
        trie.insert(&key, item).expect("in-memory trie cannot miss nodes");
    }
    trie.root_hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyValueStore, MemoryKv, WriteBatch};

    struct KvNodes<'a>(&'a MemoryKv);

    impl<'a> NodeDatabase for KvNodes<'a> {
        fn node(&self, hash: H256) -> Result<Option<Vec<u8>>, StateError> {
            Ok(self.0.get(hash.as_bytes()).map_err(|e| StateError::Kv(e.to_string()))?)
        }
    }

    fn persist(kv: &MemoryKv, nodes: Vec<(H256, Vec<u8>)>) {
        let mut batch = WriteBatch::new();
        for (hash, bytes) in nodes {
            batch.put(hash.as_bytes().to_vec(), bytes);
        }
        kv.write(batch).unwrap();
    }

    #[test]
    fn empty_root_constant() {
        let kv = MemoryKv::new();
        let db = KvNodes(&kv);
        let trie = Trie::new(&db, EMPTY_ROOT).unwrap();
        assert_eq!(trie.root_hash(), EMPTY_ROOT);
    }

    // Canonical fixture from the ethereum "trietest" suite.
    #[test]
    fn known_root_for_dog_fixture() {
        let kv = MemoryKv::new();
        let db = KvNodes(&kv);
        let mut trie = Trie::new(&db, EMPTY_ROOT).unwrap();

        trie.insert(b"do", b"verb".to_vec()).unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        trie.insert(b"doge", b"coin".to_vec()).unwrap();
        trie.insert(b"horse", b"stallion".to_vec()).unwrap();

        let expected =
            hex::decode("5991bb8c6514148a29db676a14ac506cd2cd5775ace63c30a4fe457715e9ac84")
                .unwrap();
        assert_eq!(trie.root_hash(), H256::from_slice(&expected));
    }

    #[test]
    fn get_reads_back_through_persisted_nodes() {
        let kv = MemoryKv::new();
        let root = {
            let db = KvNodes(&kv);
            let mut trie = Trie::new(&db, EMPTY_ROOT).unwrap();
            trie.insert(b"alpha", b"one".to_vec()).unwrap();
            trie.insert(b"alpine", b"two".to_vec()).unwrap();
            trie.insert(b"beta", b"three".to_vec()).unwrap();
            let mut nodes = Vec::new();
            let root = trie.commit(&mut nodes);
            persist(&kv, nodes);
            root
        };

        let db = KvNodes(&kv);
        let trie = Trie::new(&db, root).unwrap();
        assert_eq!(trie.get(b"alpha").unwrap(), Some(b"one".to_vec()));
        assert_eq!(trie.get(b"alpine").unwrap(), Some(b"two".to_vec()));
        assert_eq!(trie.get(b"beta").unwrap(), Some(b"three".to_vec()));
        assert_eq!(trie.get(b"gamma").unwrap(), None);
    }

    #[test]
    fn insert_then_remove_restores_root() {
        let kv = MemoryKv::new();
        let db = KvNodes(&kv);
        let mut trie = Trie::new(&db, EMPTY_ROOT).unwrap();

        trie.insert(b"do", b"verb".to_vec()).unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        let before = trie.root_hash();

        trie.insert(b"doge", b"coin".to_vec()).unwrap();
        assert_ne!(trie.root_hash(), before);

        trie.remove(b"doge").unwrap();
        assert_eq!(trie.root_hash(), before);

        trie.remove(b"do").unwrap();
        trie.remove(b"dog").unwrap();
        assert_eq!(trie.root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn missing_node_is_distinguished() {
        let kv = MemoryKv::new();
        let db = KvNodes(&kv);
        let absent = H256::repeat_byte(0xab);
        match Trie::new(&db, absent) {
            Err(StateError::MissingNode(hash)) => assert_eq!(hash, absent),
            other => panic!("expected MissingNode, got {other:?}"),
        }
    }

    #[test]
    fn ordered_trie_of_single_item() {
        // Must equal a one-leaf trie keyed by rlp(0) = 0x80.
        let root = ordered_trie_root(vec![b"value".to_vec()]);
        let kv = MemoryKv::new();
        let db = KvNodes(&kv);
        let mut trie = Trie::new(&db, EMPTY_ROOT).unwrap();
        trie.insert(&rlp::encode(&0u64), b"value".to_vec()).unwrap();
        assert_eq!(root, trie.root_hash());
    }
}
