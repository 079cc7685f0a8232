/// Default number of cells on a fresh tape.
pub const DEFAULT_TAPE_SIZE: usize = 30_000;

/// A fixed-capacity memory tape of 8-bit wrapping cells with one data pointer.
///
/// The pointer starts at cell 0 and may never leave `0..capacity`; moves that
/// would do so are refused and leave the pointer where it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<u8>,
    pointer: usize,
}

impl Tape {
    /// Create a zeroed tape. A capacity of 0 is bumped to 1 so the origin
    /// cell always exists.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity.max(1)],
            pointer: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn get(&self) -> u8 {
        self.cells[self.pointer]
    }

    pub fn set(&mut self, value: u8) {
        self.cells[self.pointer] = value;
    }

    pub fn increment(&mut self) {
        self.cells[self.pointer] = self.cells[self.pointer].wrapping_add(1);
    }

    pub fn decrement(&mut self) {
        self.cells[self.pointer] = self.cells[self.pointer].wrapping_sub(1);
    }

    /// Move one cell right. Returns `false` if already on the last cell.
    #[must_use]
    pub fn move_right(&mut self) -> bool {
        if self.pointer + 1 >= self.cells.len() {
            return false;
        }
        self.pointer += 1;
        true
    }

    /// Move one cell left. Returns `false` if already on cell 0.
    #[must_use]
    pub fn move_left(&mut self) -> bool {
        if self.pointer == 0 {
            return false;
        }
        self.pointer -= 1;
        true
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new(DEFAULT_TAPE_SIZE)
    }
}
