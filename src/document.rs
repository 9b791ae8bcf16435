use crate::object_stream::calc_checksum;
use crate::trailer::{Trailer, TrailerKind};
use crate::xref::{CrossReferenceTable, XrefEntry};
use crate::{dictionary, Dictionary, Error, Object, ObjectId, Result, SecurityHandler};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// How a document was opened. Only `Modify` refreshes the file `/ID` and the
/// Info dictionary's `/ModDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    Modify,
    Import,
}

/// Pointer into the hint stream of a linearized file.
#[derive(Debug, Clone, Copy)]
pub struct Linearization {
    /// Id of the object carrying the `/Linearized` dictionary.
    pub object_id: ObjectId,
    /// `(offset, length)` of the primary hint stream, from `/H`.
    pub hint_stream: Option<(i64, i64)>,
}

/// PDF document: the object arena, its trailer chain and the working
/// cross-reference table.
pub struct Document {
    /// The version of the PDF specification to which the file conforms.
    pub version: String,

    /// Update generations, newest first. Never empty; the chain order
    /// stands in for the file's `/Prev` links.
    pub trailers: Vec<Trailer>,

    /// Document-wide table holding the latest version of every object
    /// number.
    pub reference_table: CrossReferenceTable,

    /// The objects that make up the document.
    pub objects: BTreeMap<ObjectId, Object>,

    pub open_mode: OpenMode,

    pub security_handler: Option<Arc<dyn SecurityHandler>>,

    pub linearization: Option<Linearization>,

    /// Raw bytes of the loaded file. Signed documents reach the output from
    /// here byte-identical; incremental saves append after them.
    pub(crate) original_bytes: Option<Vec<u8>>,

    /// Offset the last `startxref` pointed at; `/Prev` of the next
    /// incremental update.
    pub(crate) last_startxref: u64,

    /// Serialization checksums recorded at load; an object whose checksum
    /// still matches is skipped by incremental saves.
    pub(crate) checksums: BTreeMap<ObjectId, u64>,

    /// `/W` floor of cross-reference streams; widths never narrow across
    /// rewrites of the same document.
    pub(crate) xref_stream_widths: [usize; 3],

    pub(crate) dead_object: Option<ObjectId>,
}

impl Document {
    /// Create new PDF document.
    pub fn new() -> Document {
        Document {
            version: "1.4".to_string(),
            trailers: vec![Trailer::empty()],
            reference_table: CrossReferenceTable::new(),
            objects: BTreeMap::new(),
            open_mode: OpenMode::Modify,
            security_handler: None,
            linearization: None,
            original_bytes: None,
            last_startxref: 0,
            checksums: BTreeMap::new(),
            xref_stream_widths: [1, 1, 2],
            dead_object: None,
        }
    }

    /// Create new PDF document with version.
    pub fn with_version<S: Into<String>>(version: S) -> Document {
        let mut document = Self::new();
        document.version = version.into();
        document
    }

    /// Dictionary of the newest trailer.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailers[0].dict
    }

    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailers[0].dict
    }

    /// The working cross-reference table.
    pub fn current_table(&self) -> &CrossReferenceTable {
        &self.reference_table
    }

    /// Current maximum object number.
    pub fn max_id(&self) -> u32 {
        self.reference_table.max_object_number()
    }

    pub fn is_read_only(&self) -> bool {
        self.trailers.iter().any(|trailer| trailer.is_read_only)
    }

    fn assert_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    /// Create an object ID.
    pub fn new_object_id(&mut self) -> ObjectId {
        self.reference_table.allocate()
    }

    /// Add PDF object into document's object list, assigning the next free
    /// number.
    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> Result<ObjectId> {
        self.assert_writable()?;
        let id = self.reference_table.allocate();
        self.reference_table
            .add(id, XrefEntry::Normal { offset: 0, generation: id.1 })?;
        self.objects.insert(id, object.into());
        Ok(id)
    }

    /// Register `object` under `id`, replacing any existing version.
    pub fn set_object<T: Into<Object>>(&mut self, id: ObjectId, object: T) -> Result<()> {
        self.assert_writable()?;
        if !self.reference_table.contains(id) {
            self.reference_table
                .replace(id, XrefEntry::Normal { offset: 0, generation: id.1 });
        }
        self.objects.insert(id, object.into());
        Ok(())
    }

    /// Remove PDF object from document's object list. The freed number is
    /// not reused within this session.
    ///
    /// Other objects may still hold references to the removed one; fix-ups
    /// rebind those to the shared dead object.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<()> {
        self.assert_writable()?;
        self.objects.remove(&id);
        self.reference_table.remove(id);
        self.checksums.remove(&id);
        Ok(())
    }

    pub fn has_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Get object by object id, recursively dereferencing chained
    /// references. A reference with no backing object resolves to the
    /// shared dead object when one exists.
    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        let mut seen = BTreeSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                return Err(Error::MissingObject(id));
            }
            match self.objects.get(&current) {
                Some(Object::Reference(next)) => current = *next,
                Some(object) => return Ok(object),
                None => {
                    // The table may know the object under a newer generation.
                    if let Some((actual, _)) = self.reference_table.lookup_number(current.0) {
                        if actual != current && self.objects.contains_key(&actual) {
                            current = actual;
                            continue;
                        }
                    }
                    if let Some(dead) = self.dead_object {
                        if dead != current {
                            if let Some(object) = self.objects.get(&dead) {
                                return Ok(object);
                            }
                        }
                    }
                    return Err(Error::MissingObject(id));
                }
            }
        }
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        let mut seen = BTreeSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                return Err(Error::MissingObject(id));
            }
            match self.objects.get(&current) {
                Some(Object::Reference(next)) => current = *next,
                Some(_) => break,
                None => return Err(Error::MissingObject(id)),
            }
        }
        Ok(self.objects.get_mut(&current).unwrap())
    }

    /// The document catalog named by the trailer's `/Root`.
    pub fn catalog(&self) -> Result<&Dictionary> {
        let root = self
            .trailer()
            .get_reference(b"Root")?
            .ok_or_else(|| Error::DictKey(b"Root".to_vec()))?;
        self.get_object(root)?.as_dict()
    }

    /// Id of the shared dead object, synthesizing it on first use.
    pub(crate) fn dead_object_id(&mut self) -> ObjectId {
        if let Some(id) = self.dead_object {
            return id;
        }
        let id = self.reference_table.allocate();
        self.reference_table
            .replace(id, XrefEntry::Normal { offset: 0, generation: 0 });
        self.objects
            .insert(id, Object::Dictionary(dictionary! { "DeadObjectCount" => 0 }));
        self.dead_object = Some(id);
        id
    }

    fn bump_dead_object_count(&mut self) {
        let Some(id) = self.dead_object else { return };
        if let Some(object) = self.objects.get_mut(&id) {
            if let Ok(dict) = object.as_dict_mut() {
                let count = dict.get_integer(b"DeadObjectCount").unwrap_or(0);
                dict.set("DeadObjectCount", count + 1);
            }
        }
    }

    /// Traverse objects from trailer recursively, return all referenced
    /// object IDs.
    pub fn traverse_objects<A: Fn(&mut Object)>(&mut self, action: A) -> Vec<ObjectId> {
        fn traverse_object<A: Fn(&mut Object)>(object: &mut Object, action: &A, refs: &mut Vec<ObjectId>) {
            action(object);
            match object {
                Object::Array(array) => {
                    for item in array.iter_mut() {
                        traverse_object(item, action, refs);
                    }
                }
                Object::Dictionary(dict) => {
                    for (_, value) in dict.iter_mut() {
                        traverse_object(value, action, refs);
                    }
                }
                Object::Stream(stream) => {
                    for (_, value) in stream.dict.iter_mut() {
                        traverse_object(value, action, refs);
                    }
                }
                Object::Reference(id) => {
                    if !refs.contains(id) {
                        refs.push(*id);
                    }
                }
                _ => {}
            }
        }
        let mut refs = vec![];
        let mut trailer_dict = std::mem::take(&mut self.trailers[0].dict);
        for (_, value) in trailer_dict.iter_mut() {
            traverse_object(value, &action, &mut refs);
        }
        self.trailers[0].dict = trailer_dict;
        let mut index = 0;
        while index < refs.len() {
            let id = refs[index];
            let resolved = self.resolve_id(id);
            if let Some(resolved) = resolved {
                if let Some(mut object) = self.objects.remove(&resolved) {
                    traverse_object(&mut object, &action, &mut refs);
                    self.objects.insert(resolved, object);
                }
            }
            index += 1;
        }
        refs
    }

    /// Arena id a reference lands on, preferring the exact generation and
    /// falling back to the latest one.
    fn resolve_id(&self, id: ObjectId) -> Option<ObjectId> {
        if self.objects.contains_key(&id) {
            return Some(id);
        }
        let (actual, _) = self.reference_table.lookup_number(id.0)?;
        self.objects.contains_key(&actual).then_some(actual)
    }

    /// Object numbers transitively reachable from the newest trailer.
    fn reachable_numbers(&self) -> BTreeSet<u32> {
        fn collect(object: &Object, pending: &mut Vec<ObjectId>) {
            match object {
                Object::Array(array) => array.iter().for_each(|item| collect(item, pending)),
                Object::Dictionary(dict) => dict.iter().for_each(|(_, value)| collect(value, pending)),
                Object::Stream(stream) => stream.dict.iter().for_each(|(_, value)| collect(value, pending)),
                Object::Reference(id) => pending.push(*id),
                _ => {}
            }
        }

        let mut pending = Vec::new();
        for (_, value) in self.trailer().iter() {
            collect(value, &mut pending);
        }
        let mut reachable = BTreeSet::new();
        while let Some(id) = pending.pop() {
            if !reachable.insert(id.0) {
                continue;
            }
            if let Some(resolved) = self.resolve_id(id) {
                collect(&self.objects[&resolved], &mut pending);
            }
        }
        reachable
    }

    /// Drops every object not transitively reachable from the trailer root;
    /// returns how many were removed.
    pub fn compact(&mut self) -> usize {
        let reachable = self.reachable_numbers();
        let doomed: Vec<ObjectId> = self
            .objects
            .keys()
            .filter(|id| !reachable.contains(&id.0))
            .copied()
            .collect();
        for id in &doomed {
            self.objects.remove(id);
            self.checksums.remove(id);
        }
        self.reference_table.retain_numbers(&reachable);
        for trailer in &mut self.trailers {
            trailer.xref.retain_numbers(&reachable);
        }
        if let Some(dead) = self.dead_object {
            if !reachable.contains(&dead.0) {
                self.dead_object = None;
            }
        }
        doomed.len()
    }

    /// Renumbers all objects 1..N, preserving the iteration order of
    /// `all_references`. Every nested reference must resolve; a dangling one
    /// aborts the renumbering.
    pub fn renumber(&mut self) -> Result<()> {
        self.assert_writable()?;

        let order = self.reference_table.all_references();
        let mut map: BTreeMap<u32, ObjectId> = BTreeMap::new();
        for id in &order {
            let next = map.len() as u32 + 1;
            map.entry(id.0).or_insert((next, 0));
        }

        // Reject before mutating anything.
        let mut dangling = None;
        let check = |id: &ObjectId, dangling: &mut Option<ObjectId>| {
            if !map.contains_key(&id.0) && dangling.is_none() {
                *dangling = Some(*id);
            }
        };
        for object in self.objects.values() {
            visit_references_shared(object, &mut |id| check(id, &mut dangling));
        }
        for trailer in &self.trailers {
            for (_, value) in trailer.dict.iter() {
                visit_references_shared(value, &mut |id| check(id, &mut dangling));
            }
        }
        if let Some(id) = dangling {
            return Err(Error::DanglingReference(id));
        }

        let rewrite = |object: &mut Object| {
            visit_references(object, &mut |id| {
                if let Some(new_id) = map.get(&id.0) {
                    *id = *new_id;
                }
            });
        };

        let old_objects = std::mem::take(&mut self.objects);
        for (id, mut object) in old_objects {
            rewrite(&mut object);
            match map.get(&id.0) {
                Some(new_id) => {
                    self.objects.insert(*new_id, object);
                }
                None => warn!("dropping unregistered object {} {} during renumber", id.0, id.1),
            }
        }

        let renumber_table = |table: &CrossReferenceTable| {
            let mut rebuilt = CrossReferenceTable::new();
            for (id, entry) in table.iter() {
                if let Some(new_id) = map.get(&id.0) {
                    let entry = match *entry {
                        XrefEntry::Normal { offset, .. } => XrefEntry::Normal { offset, generation: 0 },
                        XrefEntry::Compressed { container, index } => {
                            let container = map.get(&container).map(|new| new.0).unwrap_or(container);
                            XrefEntry::Compressed { container, index }
                        }
                        XrefEntry::Free => XrefEntry::Free,
                    };
                    rebuilt.replace(*new_id, entry);
                }
            }
            rebuilt
        };
        self.reference_table = renumber_table(&self.reference_table);
        for trailer in &mut self.trailers {
            trailer.xref = renumber_table(&trailer.xref);
            let mut dict = std::mem::take(&mut trailer.dict);
            for (_, value) in dict.iter_mut() {
                rewrite(value);
            }
            trailer.dict = dict;
            for number in trailer.object_streams.iter_mut() {
                if let Some(new_id) = map.get(number) {
                    *number = new_id.0;
                }
            }
        }
        self.dead_object = self.dead_object.and_then(|id| map.get(&id.0).copied());
        self.checksums.clear();
        Ok(())
    }

    /// Re-binds every nested reference to a live object. A stale generation
    /// is rewritten to the current one; a number with no backing object is
    /// rewritten to the shared dead object.
    pub fn fix_xrefs(&mut self, force_document: bool) {
        let table = if force_document {
            &self.reference_table
        } else {
            &self.trailers[0].xref
        };

        // Number -> current id under the chosen table.
        let mut current: BTreeMap<u32, ObjectId> = BTreeMap::new();
        for (id, _) in table.iter() {
            let slot = current.entry(id.0).or_insert(*id);
            if id.1 > slot.1 {
                *slot = *id;
            }
        }

        let mut needs_dead = false;
        {
            let mut check = |id: &ObjectId| {
                if !current.contains_key(&id.0) {
                    needs_dead = true;
                }
            };
            for object in self.objects.values() {
                visit_references_shared(object, &mut check);
            }
            for (_, value) in self.trailers[0].dict.iter() {
                visit_references_shared(value, &mut check);
            }
        }
        let dead = if needs_dead { Some(self.dead_object_id()) } else { self.dead_object };
        if let Some(dead) = dead {
            current.entry(dead.0).or_insert(dead);
        }

        let mut rebinds = 0usize;
        let mut dead_binds = 0usize;
        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        for id in ids {
            let mut object = self.objects.remove(&id).unwrap();
            visit_references(&mut object, &mut |reference| match current.get(&reference.0) {
                Some(current_id) => {
                    if current_id != reference {
                        *reference = *current_id;
                        rebinds += 1;
                    }
                }
                None => {
                    if let Some(dead) = dead {
                        *reference = dead;
                        dead_binds += 1;
                    }
                }
            });
            self.objects.insert(id, object);
        }
        let mut trailer_dict = std::mem::take(&mut self.trailers[0].dict);
        for (_, value) in trailer_dict.iter_mut() {
            visit_references(value, &mut |reference| match current.get(&reference.0) {
                Some(current_id) => {
                    if current_id != reference {
                        *reference = *current_id;
                        rebinds += 1;
                    }
                }
                None => {
                    if let Some(dead) = dead {
                        *reference = dead;
                        dead_binds += 1;
                    }
                }
            });
        }
        self.trailers[0].dict = trailer_dict;
        for _ in 0..dead_binds {
            self.bump_dead_object_count();
        }
        if rebinds > 0 || dead_binds > 0 {
            warn!("fixed {} stale and {} dangling references", rebinds, dead_binds);
        }
    }

    /// True when any object is a `/Type /Sig` dictionary: the original bytes
    /// must then survive saving untouched.
    pub fn has_signature(&self) -> bool {
        self.objects.values().any(|object| {
            object
                .as_dict()
                .map(|dict| dict.type_is(b"Sig"))
                .unwrap_or(false)
        })
    }

    /// Applies the post-parse trailer-chain state (single-trailer flatten,
    /// signature lock-down, linearized-overlay merge, or keep-as-is).
    pub(crate) fn normalize_trailer_chain(&mut self) {
        if self.has_signature() {
            for trailer in &mut self.trailers {
                trailer.is_read_only = true;
            }
            return;
        }
        if self.trailers.len() == 1 {
            // Flattened: the working table of a single generation is its
            // own table; nothing to discard.
            return;
        }
        let all_streams = self
            .trailers
            .iter()
            .all(|trailer| trailer.kind == TrailerKind::CrossReferenceStream);
        if all_streams && self.trailers.len() > 2 && self.linearization.is_some() {
            self.merge_linearized_overlay();
        }
    }

    /// Case of an incremental overlay another producer applied over a
    /// linearized file: the top trailer is merged into its predecessor and
    /// its object streams leave the document. The output is no longer
    /// linearized.
    fn merge_linearized_overlay(&mut self) {
        let top = self.trailers.remove(0);

        for &number in &top.object_streams {
            if let Some((id, _)) = self.reference_table.lookup_number(number) {
                self.objects.remove(&id);
                self.checksums.remove(&id);
            }
            self.reference_table.remove((number, 0));
        }

        for (id, entry) in top.xref.iter() {
            if top.object_streams.contains(&id.0) {
                continue;
            }
            let mut replaced = false;
            for older in self.trailers.iter_mut() {
                if older.xref.contains(*id) {
                    older.xref.replace(*id, *entry);
                    replaced = true;
                    break;
                }
            }
            if !replaced {
                // Appended to the immediate predecessor.
                self.trailers[0].xref.replace(*id, *entry);
            }
        }

        if let Some(linearization) = self.linearization.take() {
            self.objects.remove(&linearization.object_id);
            self.reference_table.remove(linearization.object_id);
        }
        self.rebuild_reference_table();
    }

    /// Rebuilds the document-wide table as the newest-wins union of the
    /// trailer tables.
    pub(crate) fn rebuild_reference_table(&mut self) {
        let max = self.reference_table.max_object_number();
        let mut union = CrossReferenceTable::new();
        for trailer in &self.trailers {
            for (id, entry) in trailer.xref.iter() {
                if !union.contains_number(id.0) {
                    union.replace(*id, *entry);
                }
            }
        }
        union.ensure_max(max);
        self.reference_table = union;
    }

    /// Records the serialization checksum of every object; incremental saves
    /// skip objects whose checksum is unchanged.
    pub(crate) fn record_checksums(&mut self) {
        let mut checksums = BTreeMap::new();
        for (id, object) in &self.objects {
            let mut bytes = Vec::new();
            if crate::writer::Writer::write_object(&mut bytes, object).is_ok() {
                checksums.insert(*id, calc_checksum(&bytes));
            }
        }
        self.checksums = checksums;
    }

    /// Refreshes the file `/ID`: the first element is kept when present, the
    /// second one changes with every modification.
    pub(crate) fn regenerate_id(&mut self) {
        let seed = md5::compute(
            self.original_bytes
                .as_deref()
                .unwrap_or(self.version.as_bytes()),
        );
        let stamp = md5::compute(format!("{}:{}", self.max_id(), time::OffsetDateTime::now_utc()));
        let first = match self.trailer().get_array(b"ID").ok().flatten() {
            Some(parts) if !parts.is_empty() => parts[0].clone(),
            _ => Object::HexString(seed.0.to_vec(), Default::default()),
        };
        let second = Object::HexString(stamp.0.to_vec(), Default::default());
        self.trailer_mut().set("ID", vec![first, second]);
    }

    /// Stamps `/ModDate` of the Info dictionary, when there is one.
    pub(crate) fn touch_modification_date(&mut self) {
        let info = match self.trailer().get_reference(b"Info") {
            Ok(Some(id)) => id,
            _ => return,
        };
        let now = Object::from(time::OffsetDateTime::now_utc());
        if let Ok(object) = self.get_object_mut(info) {
            if let Ok(dict) = object.as_dict_mut() {
                dict.set("ModDate", now);
            }
        }
    }

    /// Applies FlateDecode to every stream that allows it.
    pub fn compress(&mut self) -> Result<()> {
        for object in self.objects.values_mut() {
            if let Object::Stream(stream) = object {
                if stream.allows_compression {
                    stream.compress()?;
                }
            }
        }
        Ok(())
    }

    /// Undoes the filter chain of every stream that can be decoded.
    pub fn decompress(&mut self) {
        for object in self.objects.values_mut() {
            if let Object::Stream(stream) = object {
                if stream.decompress().is_err() {
                    // Unsupported chains keep their bytes.
                }
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Calls `visit` on every reference nested in `object`.
pub(crate) fn visit_references(object: &mut Object, visit: &mut dyn FnMut(&mut ObjectId)) {
    match object {
        Object::Array(array) => {
            for item in array.iter_mut() {
                visit_references(item, visit);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                visit_references(value, visit);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                visit_references(value, visit);
            }
        }
        Object::Reference(id) => visit(id),
        _ => {}
    }
}

pub(crate) fn visit_references_shared(object: &Object, visit: &mut dyn FnMut(&ObjectId)) {
    match object {
        Object::Array(array) => {
            for item in array.iter() {
                visit_references_shared(item, visit);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                visit_references_shared(value, visit);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                visit_references_shared(value, visit);
            }
        }
        Object::Reference(id) => visit(id),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc
            .add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            })
            .unwrap();
        doc.set_object(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            },
        )
        .unwrap();
        let catalog_id = doc
            .add_object(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            })
            .unwrap();
        doc.trailer_mut().set("Root", catalog_id);
        doc
    }

    #[test]
    fn get_object_follows_reference_chains() {
        let mut doc = Document::new();
        let target = doc.add_object(Object::Integer(42)).unwrap();
        let alias = doc.add_object(Object::Reference(target)).unwrap();
        assert_eq!(doc.get_object(alias).unwrap(), &Object::Integer(42));
    }

    #[test]
    fn reference_cycle_is_detected() {
        let mut doc = Document::new();
        let a = doc.new_object_id();
        let b = doc.new_object_id();
        doc.set_object(a, Object::Reference(b)).unwrap();
        doc.set_object(b, Object::Reference(a)).unwrap();
        assert!(doc.get_object(a).is_err());
    }

    #[test]
    fn max_object_number_matches_highest_key() {
        let mut doc = Document::new();
        doc.add_object(Object::Null).unwrap();
        doc.add_object(Object::Null).unwrap();
        let max = doc
            .reference_table
            .all_references()
            .iter()
            .map(|id| id.0)
            .max()
            .unwrap();
        assert_eq!(doc.max_id(), max);
    }

    #[test]
    fn traverse_objects_visits_the_whole_graph() {
        let mut doc = sample_document();
        let refs = doc.traverse_objects(|_| {});
        assert!(refs.contains(&(3, 0)), "catalog is referenced from the trailer");
        assert!(refs.contains(&(1, 0)));
        assert!(refs.contains(&(2, 0)));
    }

    #[test]
    fn compact_removes_unreachable_objects() {
        let mut doc = sample_document();
        doc.add_object(Object::string_literal("orphan")).unwrap();
        let removed = doc.compact();
        assert_eq!(removed, 1);
        // Everything left is reachable from the catalog.
        let reachable = doc.reachable_numbers();
        assert!(doc.objects.keys().all(|id| reachable.contains(&id.0)));
    }

    #[test]
    fn renumber_produces_dense_numbering() {
        let mut doc = sample_document();
        doc.add_object(Object::Null).unwrap();
        doc.remove_object((4, 0)).unwrap();
        doc.add_object(Object::Null).unwrap();
        doc.renumber().unwrap();

        let numbers: Vec<u32> = doc.reference_table.all_references().iter().map(|id| id.0).collect();
        let count = numbers.len() as u32;
        assert_eq!(numbers, (1..=count).collect::<Vec<u32>>());
        assert!(doc.catalog().is_ok());
    }

    #[test]
    fn fix_xrefs_rebinds_dangling_references_to_dead_object() {
        let mut doc = sample_document();
        let ghost = doc.new_object_id();
        let holder = doc
            .add_object(dictionary! { "Ghost" => Object::Reference(ghost) })
            .unwrap();
        doc.fix_xrefs(true);

        let dead = doc.dead_object.expect("dead object synthesized");
        let rebound = doc.get_object(holder).unwrap().as_dict().unwrap();
        assert_eq!(rebound.get_reference(b"Ghost").unwrap(), Some(dead));
        let dead_dict = doc.get_object(dead).unwrap().as_dict().unwrap();
        assert_eq!(dead_dict.get_integer(b"DeadObjectCount").unwrap(), 1);
    }

    #[test]
    fn signature_locks_every_trailer() {
        let mut doc = sample_document();
        doc.add_object(dictionary! {
            "Type" => "Sig",
            "Filter" => "Adobe.PPKLite",
        })
        .unwrap();
        doc.normalize_trailer_chain();
        assert!(doc.trailers.iter().all(|trailer| trailer.is_read_only));
    }

    /// An incremental overlay over a linearized file: three stream-form
    /// generations, no signature. The top one is merged into its
    /// predecessor and its object streams leave the document.
    #[test]
    fn linearized_overlay_is_merged_into_its_predecessor() {
        let mut doc = Document::with_version("1.5");

        let mut oldest = Trailer::new(
            Dictionary::new(),
            TrailerKind::CrossReferenceStream,
            CrossReferenceTable::new(),
            100,
        );
        oldest
            .xref
            .add((1, 0), XrefEntry::Normal { offset: 120, generation: 0 })
            .unwrap();
        oldest
            .xref
            .add((2, 0), XrefEntry::Normal { offset: 240, generation: 0 })
            .unwrap();
        oldest
            .xref
            .add((5, 0), XrefEntry::Normal { offset: 500, generation: 0 })
            .unwrap();

        let mut middle = Trailer::new(
            Dictionary::new(),
            TrailerKind::CrossReferenceStream,
            CrossReferenceTable::new(),
            900,
        );
        middle
            .xref
            .add((2, 0), XrefEntry::Normal { offset: 950, generation: 0 })
            .unwrap();

        let mut top = Trailer::new(
            Dictionary::new(),
            TrailerKind::CrossReferenceStream,
            CrossReferenceTable::new(),
            1800,
        );
        top.xref
            .add((2, 0), XrefEntry::Compressed { container: 9, index: 0 })
            .unwrap();
        top.xref
            .add((3, 0), XrefEntry::Compressed { container: 9, index: 1 })
            .unwrap();
        top.xref
            .add((9, 0), XrefEntry::Normal { offset: 1850, generation: 0 })
            .unwrap();
        top.object_streams.push(9);

        doc.trailers = vec![top, middle, oldest];
        doc.rebuild_reference_table();

        doc.objects.insert((1, 0), Object::Null);
        doc.objects.insert((2, 0), Object::Integer(2));
        doc.objects.insert((3, 0), Object::Integer(3));
        doc.objects
            .insert((5, 0), Object::Dictionary(dictionary! { "Linearized" => 1 }));
        doc.objects.insert(
            (9, 0),
            Object::Stream(crate::Stream::new(dictionary! { "Type" => "ObjStm" }, vec![])),
        );
        doc.linearization = Some(crate::document::Linearization {
            object_id: (5, 0),
            hint_stream: None,
        });

        doc.normalize_trailer_chain();

        // The top trailer is gone; its references moved down.
        assert_eq!(doc.trailers.len(), 2);
        assert_eq!(
            doc.trailers[0].xref.lookup((2, 0)),
            Some(&XrefEntry::Compressed { container: 9, index: 0 })
        );
        assert_eq!(
            doc.trailers[0].xref.lookup((3, 0)),
            Some(&XrefEntry::Compressed { container: 9, index: 1 })
        );
        // Its object stream containers left the document.
        assert!(!doc.objects.contains_key(&(9, 0)));
        assert!(!doc.reference_table.contains_number(9));
        // The linearization dictionary is dropped.
        assert!(doc.linearization.is_none());
        assert!(!doc.objects.contains_key(&(5, 0)));
    }

    #[test]
    fn two_generation_chains_are_kept() {
        let mut doc = sample_document();
        let second = Trailer::new(
            Dictionary::new(),
            TrailerKind::Classic,
            CrossReferenceTable::new(),
            700,
        );
        doc.trailers.push(second);
        doc.normalize_trailer_chain();
        assert_eq!(doc.trailers.len(), 2);
    }

    #[test]
    fn mutation_is_rejected_on_read_only_documents() {
        let mut doc = sample_document();
        doc.trailers[0].is_read_only = true;
        match doc.add_object(Object::Null) {
            Err(Error::ReadOnly) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
