/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

impl Assoc {
    fn sign(self) -> i8 {
        match self {
            Assoc::Left => -1,
            Assoc::Right => 1,
        }
    }
}

const DEL_BEFORE: u8 = 1;
const DEL_AFTER: u8 = 2;
const DEL_ACROSS: u8 = 4;
const DEL_SIDE: u8 = 8;

/// Result of mapping a position, with information about whether the
/// content around it was deleted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    del_info: u8,
}

impl MapResult {
    /// The token on the associated side of the position was deleted
    pub fn deleted(&self) -> bool {
        self.del_info & DEL_SIDE > 0
    }

    pub fn deleted_before(&self) -> bool {
        self.del_info & (DEL_BEFORE | DEL_ACROSS) > 0
    }

    pub fn deleted_after(&self) -> bool {
        self.del_info & (DEL_AFTER | DEL_ACROSS) > 0
    }

    pub fn deleted_across(&self) -> bool {
        self.del_info & DEL_ACROSS > 0
    }
}

/// Position changes made by a single step: a list of
/// `(start, old_size, new_size)` ranges in ascending order.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct StepMap {
    ranges: Vec<(usize, usize, usize)>,
    inverted: bool,
}

impl StepMap {
    pub fn new(ranges: Vec<(usize, usize, usize)>) -> Self {
        Self {
            ranges,
            inverted: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn replace(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            Self::empty()
        } else {
            Self::new(vec![(start, old_size, new_size)])
        }
    }

    pub fn invert(&self) -> StepMap {
        Self {
            ranges: self.ranges.clone(),
            inverted: !self.inverted,
        }
    }

    fn sizes(&self, range: &(usize, usize, usize)) -> (usize, usize) {
        if self.inverted {
            (range.2, range.1)
        } else {
            (range.1, range.2)
        }
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = if self.inverted {
                (range.0 as isize - diff) as usize
            } else {
                range.0
            };
            if start > pos {
                break;
            }
            let (old_size, new_size) = self.sizes(range);
            let end = start + old_size;
            if pos <= end {
                let side = if old_size == 0 {
                    assoc.sign()
                } else if pos == start {
                    -1
                } else if pos == end {
                    1
                } else {
                    assoc.sign()
                };
                let base = start as isize + diff;
                let result = if side < 0 { base } else { base + new_size as isize };
                let mut del_info = if pos == start {
                    DEL_AFTER
                } else if pos == end {
                    DEL_BEFORE
                } else {
                    DEL_ACROSS
                };
                let on_edge = match assoc {
                    Assoc::Left => pos == start,
                    Assoc::Right => pos == end,
                };
                if !on_edge {
                    del_info |= DEL_SIDE;
                }
                return MapResult {
                    pos: result.max(0) as usize,
                    del_info,
                };
            }
            diff += new_size as isize - old_size as isize;
        }
        MapResult {
            pos: (pos as isize + diff).max(0) as usize,
            del_info: 0,
        }
    }

    /// Call `f(old_start, old_end, new_start, new_end)` for each changed range
    pub fn for_each<F: FnMut(usize, usize, usize, usize)>(&self, mut f: F) {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = range.0;
            let old_start = if self.inverted {
                (start as isize - diff) as usize
            } else {
                start
            };
            let new_start = if self.inverted {
                start
            } else {
                (start as isize + diff) as usize
            };
            let (old_size, new_size) = self.sizes(range);
            f(old_start, old_start + old_size, new_start, new_start + new_size);
            diff += new_size as isize - old_size as isize;
        }
    }
}

/// A pipeline of step maps.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        Self { maps }
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn append_map(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn append_mapping(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().cloned());
    }

    /// Mapping from the end state back to the start state
    pub fn invert(&self) -> Mapping {
        Mapping {
            maps: self.maps.iter().rev().map(StepMap::invert).collect(),
        }
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, mut pos: usize, assoc: Assoc) -> MapResult {
        let mut del_info = 0;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            del_info |= result.del_info;
            pos = result.pos;
        }
        MapResult { pos, del_info }
    }
}
