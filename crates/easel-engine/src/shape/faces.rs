use super::TextureSet;

/// A run of consecutive triangles sharing one texture set.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// First triangle of the run.
    pub offset: usize,
    /// Number of triangles.
    pub length: usize,
    /// Smallest and largest vertex index referenced by the run.
    pub min_index: usize,
    pub max_index: usize,
    pub textures: TextureSet,
}

/// Groups triangles into [`Face`]s as they are emitted.
#[derive(Debug, Default)]
pub struct FaceList {
    faces: Vec<Face>,
}

impl FaceList {
    pub fn with_capacity(n: usize) -> Self {
        Self { faces: Vec::with_capacity(n) }
    }

    pub fn clear(&mut self) {
        self.faces.clear();
    }

    pub fn as_slice(&self) -> &[Face] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Registers triangle number `index` over vertices `tri`.
    ///
    /// Starts a new face when the texture set differs from the one of the
    /// face being extended, or when the previous triangle is not `index - 1`.
    pub fn push(&mut self, index: usize, tri: [usize; 3], textures: TextureSet) {
        let lo = tri[0].min(tri[1]).min(tri[2]);
        let hi = tri[0].max(tri[1]).max(tri[2]);

        if let Some(face) = self.faces.last_mut() {
            if face.textures == textures && face.offset + face.length == index {
                face.length += 1;
                face.min_index = face.min_index.min(lo);
                face.max_index = face.max_index.max(hi);
                return;
            }
        }
        super::vertex::push_doubling(
            &mut self.faces,
            Face { offset: index, length: 1, min_index: lo, max_index: hi, textures },
        );
    }

    /// Total triangles covered.
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(|f| f.length).sum()
    }
}
