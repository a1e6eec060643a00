use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bitstream::{BitString, BitWriter};
use crate::error::{CodecError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node<S> {
    Leaf { symbol: S, weight: u64 },
    Internal { weight: u64, zero: usize, one: usize },
}

impl<S> Node<S> {
    fn weight(&self) -> u64 {
        match self {
            Node::Leaf { weight, .. } | Node::Internal { weight, .. } => *weight,
        }
    }
}

/// Huffman tree stored as a flat node array.
///
/// Leaves occupy ids `0..n` in ascending symbol order, internal nodes follow
/// in creation order. The queue pops the lowest `(weight, id)` first, which
/// fixes the tree for equal weights; the first node popped of each pair
/// takes bit `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree<S> {
    nodes: Vec<Node<S>>,
    root: Option<usize>,
}

impl<S: Ord + Clone> HuffmanTree<S> {
    pub fn build<'a, I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = &'a S>,
        S: 'a,
    {
        Self::from_frequencies(&frequencies(symbols))
    }

    pub fn from_frequencies(freqs: &BTreeMap<S, u64>) -> Self {
        let mut nodes: Vec<Node<S>> = freqs
            .iter()
            .map(|(symbol, &weight)| Node::Leaf {
                symbol: symbol.clone(),
                weight,
            })
            .collect();

        let mut queue: BinaryHeap<Reverse<(u64, usize)>> = nodes
            .iter()
            .enumerate()
            .map(|(id, node)| Reverse((node.weight(), id)))
            .collect();

        while queue.len() > 1 {
            let (Some(Reverse((w0, zero))), Some(Reverse((w1, one)))) = (queue.pop(), queue.pop())
            else {
                break;
            };
            let id = nodes.len();
            nodes.push(Node::Internal {
                weight: w0 + w1,
                zero,
                one,
            });
            queue.push(Reverse((w0 + w1, id)));
        }

        let root = queue.pop().map(|Reverse((_, id))| id);
        Self { nodes, root }
    }

    pub fn symbol_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn total_weight(&self) -> u64 {
        self.root.map_or(0, |r| self.nodes[r].weight())
    }

    /// Assigns codes by walking from the root. A tree with one leaf gives
    /// that symbol the code `0`.
    pub fn codebook(&self) -> Codebook<S> {
        let mut codes = BTreeMap::new();
        let Some(root) = self.root else {
            return Codebook { codes };
        };

        if let Node::Leaf { symbol, .. } = &self.nodes[root] {
            codes.insert(symbol.clone(), Code(vec![false]));
            return Codebook { codes };
        }

        let mut stack = vec![(root, Vec::new())];
        while let Some((id, prefix)) = stack.pop() {
            match &self.nodes[id] {
                Node::Leaf { symbol, .. } => {
                    codes.insert(symbol.clone(), Code(prefix));
                }
                Node::Internal { zero, one, .. } => {
                    let mut zero_prefix = prefix.clone();
                    zero_prefix.push(false);
                    let mut one_prefix = prefix;
                    one_prefix.push(true);
                    stack.push((*one, one_prefix));
                    stack.push((*zero, zero_prefix));
                }
            }
        }
        Codebook { codes }
    }
}

pub fn frequencies<'a, S, I>(symbols: I) -> BTreeMap<S, u64>
where
    S: Ord + Clone + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let mut freqs = BTreeMap::new();
    for symbol in symbols {
        *freqs.entry(symbol.clone()).or_insert(0) += 1;
    }
    freqs
}

/// A variable-length bit code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code(Vec<bool>);

impl Code {
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_prefix_of(&self, other: &Code) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Code {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(CodecError::corrupt(format!(
                    "invalid character {other:?} in code"
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Code)
    }
}

/// Symbol to code mapping for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<CodeEntry<S>>",
    into = "Vec<CodeEntry<S>>",
    bound(
        serialize = "S: Serialize + Ord + Clone",
        deserialize = "S: Deserialize<'de> + Ord + Clone"
    )
)]
pub struct Codebook<S: Ord> {
    codes: BTreeMap<S, Code>,
}

#[derive(Serialize, Deserialize)]
struct CodeEntry<S> {
    symbol: S,
    code: String,
}

impl<S: Ord + Clone> From<Codebook<S>> for Vec<CodeEntry<S>> {
    fn from(book: Codebook<S>) -> Self {
        book.codes
            .into_iter()
            .map(|(symbol, code)| CodeEntry {
                symbol,
                code: code.to_string(),
            })
            .collect()
    }
}

impl<S: Ord + Clone> TryFrom<Vec<CodeEntry<S>>> for Codebook<S> {
    type Error = CodecError;

    fn try_from(entries: Vec<CodeEntry<S>>) -> Result<Self> {
        let entries = entries
            .into_iter()
            .map(|e| Ok((e.symbol, e.code.parse::<Code>()?)))
            .collect::<Result<Vec<_>>>()?;
        Codebook::from_entries(entries)
    }
}

impl<S: Ord + Clone> Codebook<S> {
    /// Builds a codebook from explicit entries, rejecting empty codes,
    /// duplicate symbols and sets that are not prefix-free.
    pub fn from_entries(entries: impl IntoIterator<Item = (S, Code)>) -> Result<Self> {
        let mut codes = BTreeMap::new();
        for (symbol, code) in entries {
            if code.is_empty() {
                return Err(CodecError::corrupt("empty code in codebook"));
            }
            if codes.insert(symbol, code).is_some() {
                return Err(CodecError::corrupt("duplicate symbol in codebook"));
            }
        }
        let book = Self { codes };
        if !book.is_prefix_free() {
            return Err(CodecError::corrupt("codebook is not prefix-free"));
        }
        Ok(book)
    }

    pub fn get(&self, symbol: &S) -> Option<&Code> {
        self.codes.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &Code)> {
        self.codes.iter()
    }

    pub fn is_prefix_free(&self) -> bool {
        let mut codes: Vec<&Code> = self.codes.values().collect();
        // Lexicographic order puts any prefix immediately before some code
        // it prefixes, so adjacent pairs are enough.
        codes.sort_by(|a, b| a.0.cmp(&b.0));
        codes.windows(2).all(|w| !w[0].is_prefix_of(w[1]))
    }

    /// Total coded length of a stream with the given symbol counts.
    pub fn coded_bits(&self, freqs: &BTreeMap<S, u64>) -> Option<u64> {
        freqs
            .iter()
            .map(|(s, &n)| self.get(s).map(|c| c.len() as u64 * n))
            .sum()
    }
}

pub fn encode<'a, S, I>(symbols: I, codebook: &Codebook<S>) -> Result<BitString>
where
    S: Ord + Clone + fmt::Debug + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let mut w = BitWriter::new();
    for symbol in symbols {
        let code = codebook
            .get(symbol)
            .ok_or_else(|| CodecError::UnknownSymbol {
                symbol: format!("{symbol:?}"),
            })?;
        w.write_all(code.bits());
    }
    Ok(w.finish())
}

/// Decodes exactly `count` symbols; the stream must end on the last one.
pub fn decode<S: Ord + Clone>(
    bits: &BitString,
    codebook: &Codebook<S>,
    count: usize,
) -> Result<Vec<S>> {
    // Every code is at least one bit long.
    if count > bits.len() {
        return Err(CodecError::corrupt(format!(
            "{} bits cannot hold {} symbols",
            bits.len(),
            count
        )));
    }
    let trie = DecodeTrie::new(codebook)?;
    let mut out = Vec::with_capacity(count.min(bits.len()));
    let mut reader = bits.reader();
    let mut node = 0;

    while let Some(bit) = reader.read_bit() {
        if out.len() == count {
            return Err(CodecError::corrupt(format!(
                "{} trailing bits after {} symbols",
                reader.remaining() + 1,
                count
            )));
        }
        node = trie.nodes[node].children[bit as usize].ok_or_else(|| {
            CodecError::corrupt(format!(
                "bit {} does not continue any code",
                reader.position() - 1
            ))
        })?;
        if let Some(symbol) = &trie.nodes[node].symbol {
            out.push(symbol.clone());
            node = 0;
        }
    }

    if node != 0 {
        return Err(CodecError::corrupt("stream ends in the middle of a code"));
    }
    if out.len() != count {
        return Err(CodecError::corrupt(format!(
            "expected {} symbols, stream holds {}",
            count,
            out.len()
        )));
    }
    Ok(out)
}

struct TrieNode<S> {
    children: [Option<usize>; 2],
    symbol: Option<S>,
}

/// Code to symbol lookup, one node per code prefix.
struct DecodeTrie<S> {
    nodes: Vec<TrieNode<S>>,
}

impl<S: Ord + Clone> DecodeTrie<S> {
    fn new(codebook: &Codebook<S>) -> Result<Self> {
        let mut nodes = vec![TrieNode {
            children: [None, None],
            symbol: None,
        }];
        for (symbol, code) in codebook.iter() {
            let mut node = 0;
            for &bit in code.bits() {
                if nodes[node].symbol.is_some() {
                    return Err(CodecError::corrupt("codebook is not prefix-free"));
                }
                node = match nodes[node].children[bit as usize] {
                    Some(next) => next,
                    None => {
                        nodes.push(TrieNode {
                            children: [None, None],
                            symbol: None,
                        });
                        let next = nodes.len() - 1;
                        nodes[node].children[bit as usize] = Some(next);
                        next
                    }
                };
            }
            let leaf = &mut nodes[node];
            if node == 0 || leaf.symbol.is_some() || leaf.children.iter().any(Option::is_some) {
                return Err(CodecError::corrupt("codebook is not prefix-free"));
            }
            leaf.symbol = Some(symbol.clone());
        }
        Ok(Self { nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multiset(counts: &[(char, usize)]) -> Vec<char> {
        counts
            .iter()
            .flat_map(|&(c, n)| std::iter::repeat_n(c, n))
            .collect()
    }

    fn code_len(book: &Codebook<char>, c: char) -> usize {
        book.get(&c).map(Code::len).unwrap_or(0)
    }

    #[test]
    fn code_lengths_follow_frequencies() {
        let symbols = multiset(&[('A', 5), ('B', 2), ('C', 1), ('D', 1)]);
        let book = HuffmanTree::build(&symbols).codebook();
        assert!(code_len(&book, 'A') <= code_len(&book, 'B'));
        assert!(code_len(&book, 'B') <= code_len(&book, 'C'));
        assert!(code_len(&book, 'B') <= code_len(&book, 'D'));
    }

    #[test]
    fn tie_breaking_is_pinned() {
        let symbols = multiset(&[('A', 5), ('B', 2), ('C', 1), ('D', 1)]);
        let book = HuffmanTree::build(&symbols).codebook();
        let codes: Vec<String> = ['A', 'B', 'C', 'D']
            .iter()
            .map(|c| book.get(c).map(Code::to_string).unwrap_or_default())
            .collect();
        assert_eq!(codes, vec!["1", "00", "010", "011"]);
    }

    #[test]
    fn build_is_order_independent() {
        let a = HuffmanTree::build(&['x', 'y', 'y', 'z', 'z', 'z']).codebook();
        let b = HuffmanTree::build(&['z', 'y', 'x', 'z', 'y', 'z']).codebook();
        assert_eq!(a, b);
    }

    #[test]
    fn generated_codes_are_prefix_free() {
        let symbols: Vec<u8> = (0..=255u8)
            .flat_map(|v| std::iter::repeat_n(v, (v as usize % 17) + 1))
            .collect();
        let tree = HuffmanTree::build(&symbols);
        assert_eq!(tree.symbol_count(), 256);
        assert_eq!(tree.total_weight(), symbols.len() as u64);
        let book = tree.codebook();
        assert_eq!(book.len(), 256);
        assert!(book.is_prefix_free());
    }

    #[test]
    fn single_symbol_gets_one_bit() {
        let book = HuffmanTree::build(&[7u8, 7, 7]).codebook();
        assert_eq!(book.get(&7).map(Code::to_string), Some("0".to_owned()));
        let bits = encode(&[7u8, 7, 7], &book).unwrap();
        assert_eq!(bits.len(), 3);
        assert_eq!(decode(&bits, &book, 3).unwrap(), vec![7, 7, 7]);
    }

    #[test]
    fn empty_input_gives_empty_codebook() {
        let book = HuffmanTree::<u8>::build(&[]).codebook();
        assert!(book.is_empty());
        let bits = encode(&[], &book).unwrap();
        assert!(bits.is_empty());
        assert!(decode(&bits, &book, 0).unwrap().is_empty());
    }

    #[test]
    fn round_trip() {
        let symbols = multiset(&[('a', 40), ('b', 7), ('c', 3), ('d', 1), ('e', 9)]);
        let book = HuffmanTree::build(&symbols).codebook();
        let bits = encode(&symbols, &book).unwrap();
        assert_eq!(
            book.coded_bits(&frequencies(&symbols)),
            Some(bits.len() as u64)
        );
        assert_eq!(decode(&bits, &book, symbols.len()).unwrap(), symbols);
    }

    #[test]
    fn unknown_symbol_fails_encode() {
        let book = HuffmanTree::build(&['a', 'b']).codebook();
        let err = encode(&['a', 'q'], &book).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownSymbol {
                symbol: "'q'".to_owned()
            }
        );
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let symbols = multiset(&[('A', 5), ('B', 2), ('C', 1), ('D', 1)]);
        let book = HuffmanTree::build(&symbols).codebook();
        // "010" is C; drop its last bit.
        let mut w = BitWriter::new();
        w.write_all(&[false, true]);
        let err = decode(&w.finish(), &book, 1).unwrap_err();
        assert!(matches!(err, CodecError::CorruptStream { .. }));
    }

    #[test]
    fn symbol_count_mismatch_is_corrupt() {
        let symbols = vec!['a', 'b', 'a', 'a'];
        let book = HuffmanTree::build(&symbols).codebook();
        let bits = encode(&symbols, &book).unwrap();
        assert!(matches!(
            decode(&bits, &book, 3),
            Err(CodecError::CorruptStream { .. })
        ));
        assert!(matches!(
            decode(&bits, &book, 5),
            Err(CodecError::CorruptStream { .. })
        ));
    }

    #[test]
    fn count_beyond_stream_length_is_corrupt() {
        let book = HuffmanTree::build(&[1u8, 2]).codebook();
        let bits = encode(&[1u8, 2, 1], &book).unwrap();
        assert!(matches!(
            decode(&bits, &book, usize::MAX),
            Err(CodecError::CorruptStream { .. })
        ));
        assert!(matches!(
            decode(&BitString::default(), &book, 4096 * 4096),
            Err(CodecError::CorruptStream { .. })
        ));
    }

    #[test]
    fn from_entries_rejects_prefix_codes() {
        let err = Codebook::from_entries([
            ('a', "0".parse().unwrap()),
            ('b', "01".parse().unwrap()),
        ])
        .unwrap_err();
        assert!(matches!(err, CodecError::CorruptStream { .. }));
        assert!(Codebook::from_entries([('a', Code(vec![]))]).is_err());
    }

    #[test]
    fn code_parse_rejects_other_characters() {
        assert!("0102".parse::<Code>().is_err());
        assert_eq!("0110".parse::<Code>().unwrap().to_string(), "0110");
    }

    #[test]
    fn codebook_serde_round_trip() {
        let symbols: Vec<u8> = vec![1, 1, 1, 2, 2, 3];
        let book = HuffmanTree::build(&symbols).codebook();
        let json = serde_json::to_string(&book).unwrap();
        assert_eq!(
            json,
            r#"[{"symbol":1,"code":"0"},{"symbol":2,"code":"11"},{"symbol":3,"code":"10"}]"#
        );
        let back: Codebook<u8> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn codebook_deserialize_rejects_prefix_codes() {
        let json = r#"[{"symbol":1,"code":"1"},{"symbol":2,"code":"10"}]"#;
        assert!(serde_json::from_str::<Codebook<u8>>(json).is_err());
    }
}
