/// Options for saving PDF documents.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Pack non-stream objects into object streams.
    pub use_object_streams: bool,

    /// Emit a cross-reference stream instead of a classic xref table.
    /// Implied by `use_object_streams`; type-2 entries have no classic form.
    pub use_xref_streams: bool,

    /// Renumber all objects 1..N before positioning.
    pub renumber: bool,

    /// Configuration for object streams.
    pub object_stream_config: ObjectStreamConfig,
}

#[derive(Debug, Clone)]
pub struct ObjectStreamConfig {
    /// A stream is considered full at this many members.
    pub max_objects_per_stream: usize,
}

impl Default for ObjectStreamConfig {
    fn default() -> ObjectStreamConfig {
        ObjectStreamConfig {
            max_objects_per_stream: 100,
        }
    }
}

impl SaveOptions {
    /// Create a builder for SaveOptions.
    pub fn builder() -> SaveOptionsBuilder {
        SaveOptionsBuilder::default()
    }
}

/// Builder for SaveOptions.
#[derive(Default)]
pub struct SaveOptionsBuilder {
    use_object_streams: bool,
    use_xref_streams: bool,
    renumber: bool,
    max_objects_per_stream: usize,
}

impl SaveOptionsBuilder {
    pub fn use_object_streams(mut self, value: bool) -> Self {
        self.use_object_streams = value;
        self
    }

    pub fn use_xref_streams(mut self, value: bool) -> Self {
        self.use_xref_streams = value;
        self
    }

    pub fn renumber(mut self, value: bool) -> Self {
        self.renumber = value;
        self
    }

    pub fn max_objects_per_stream(mut self, value: usize) -> Self {
        self.max_objects_per_stream = value;
        self
    }

    pub fn build(self) -> SaveOptions {
        SaveOptions {
            use_object_streams: self.use_object_streams,
            use_xref_streams: self.use_xref_streams || self.use_object_streams,
            renumber: self.renumber,
            object_stream_config: ObjectStreamConfig {
                max_objects_per_stream: if self.max_objects_per_stream == 0 {
                    100
                } else {
                    self.max_objects_per_stream
                },
            },
        }
    }
}
