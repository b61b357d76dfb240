/// Assembles a minimal classfile: constant pool, this/super/interfaces, and
/// method name/descriptor pairs. Fields, method bodies, and attributes are
/// omitted; the result still parses as a complete class.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    this_class: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    methods: Vec<(String, String)>,
}

impl ClassFileBuilder {
    /// Starts a class whose superclass defaults to `java/lang/Object`.
    pub fn new(internal_name: &str) -> Self {
        Self {
            this_class: internal_name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn super_class(mut self, internal_name: &str) -> Self {
        self.super_class = Some(internal_name.to_string());
        self
    }

    /// Clears the superclass slot, as `java/lang/Object` itself has it zero.
    pub fn object_root(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn interface(mut self, internal_name: &str) -> Self {
        self.interfaces.push(internal_name.to_string());
        self
    }

    pub fn method(mut self, name: &str, descriptor: &str) -> Self {
        self.methods.push((name.to_string(), descriptor.to_string()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pool = PoolBuilder::default();
        let this_idx = pool.class(&self.this_class);
        let super_idx = self.super_class.as_deref().map(|name| pool.class(name));
        let interface_idxs: Vec<u16> =
            self.interfaces.iter().map(|name| pool.class(name)).collect();
        let method_idxs: Vec<(u16, u16)> = self
            .methods
            .iter()
            .map(|(name, desc)| (pool.utf8(name), pool.utf8(desc)))
            .collect();

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        push_u16(&mut out, 0); // minor_version
        push_u16(&mut out, 52); // major_version (Java 8)
        pool.write(&mut out);
        push_u16(&mut out, 0x0021); // ACC_PUBLIC | ACC_SUPER
        push_u16(&mut out, this_idx);
        push_u16(&mut out, super_idx.unwrap_or(0));
        push_u16(&mut out, self.interfaces.len() as u16);
        for idx in interface_idxs {
            push_u16(&mut out, idx);
        }
        push_u16(&mut out, 0); // fields_count
        push_u16(&mut out, self.methods.len() as u16);
        for (name_idx, desc_idx) in method_idxs {
            push_u16(&mut out, 0x0001); // ACC_PUBLIC
            push_u16(&mut out, name_idx);
            push_u16(&mut out, desc_idx);
            push_u16(&mut out, 0); // attributes_count
        }
        push_u16(&mut out, 0); // class attributes_count
        out
    }
}

#[derive(Debug, Default)]
struct PoolBuilder {
    entries: Vec<Entry>,
}

#[derive(Debug, PartialEq, Eq)]
enum Entry {
    Utf8(String),
    Class(u16),
}

impl PoolBuilder {
    fn utf8(&mut self, text: &str) -> u16 {
        self.intern(Entry::Utf8(text.to_string()))
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        let name_idx = self.utf8(internal_name);
        self.intern(Entry::Class(name_idx))
    }

    fn intern(&mut self, entry: Entry) -> u16 {
        if let Some(found) = self.entries.iter().position(|e| *e == entry) {
            return (found + 1) as u16;
        }
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn write(&self, out: &mut Vec<u8>) {
        push_u16(out, (self.entries.len() + 1) as u16);
        for entry in &self.entries {
            match entry {
                Entry::Utf8(text) => {
                    out.push(1);
                    push_u16(out, text.len() as u16);
                    out.extend_from_slice(text.as_bytes());
                }
                Entry::Class(name_idx) => {
                    out.push(7);
                    push_u16(out, *name_idx);
                }
            }
        }
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}
