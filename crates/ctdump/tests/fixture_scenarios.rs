use ctdump::{
    abi::{BitFieldPacking, TargetAbi},
    cache::TypeRegistry,
    config::DumpConfig,
    dump::Dumper,
    errors::{DumpError, FormatError},
    field::{AggregateKind, FieldDescriptor, FieldKind, PointerTarget},
    memory::{AddressSpace, MemoryRegion},
    primitive::PrimitiveKind::{self, *},
    writer::InstanceBuilder,
};

/// x87 extended bits of the `long double` nearest to 1e-300.
const X87_1E_300: [u8; 10] = [0xca, 0xc6, 0x9a, 0xc7, 0x17, 0xfe, 0x70, 0xab, 0x1a, 0x3c];

fn primitive_zoo(signed: bool, abi: &TargetAbi) -> Vec<FieldDescriptor> {
    let int = |unsigned: PrimitiveKind, signed_kind: PrimitiveKind| if signed { signed_kind } else { unsigned };

    vec![
        FieldDescriptor::primitive("a", int(U8, I8)),
        FieldDescriptor::primitive("b", int(U16, I16)),
        FieldDescriptor::primitive("c", int(U32, I32)),
        FieldDescriptor::primitive("d", abi.c_long(signed)),
        FieldDescriptor::primitive("e", int(U64, I64)),
        FieldDescriptor::primitive("f", F32),
        FieldDescriptor::primitive("g", F64),
        FieldDescriptor::primitive("h", LongDouble),
    ]
}

fn struct_c() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::primitive("a1", U32),
        FieldDescriptor::bit_field("b1", U32, 4),
        FieldDescriptor::bit_field("c1", U32, 10),
        FieldDescriptor::bit_field("d1", U32, 2),
        FieldDescriptor::primitive("a2", I8),
        FieldDescriptor::bit_field("b2", U32, 4),
        FieldDescriptor::bit_field("c2", U32, 10),
        FieldDescriptor::bit_field("d2", U64, 3),
        FieldDescriptor::primitive("h", I32),
    ]
}

fn registry(abi: TargetAbi) -> TypeRegistry {
    let mut registry = TypeRegistry::new(abi);
    registry
        .define("struct_a", AggregateKind::Struct, &primitive_zoo(false, &abi))
        .unwrap();
    registry
        .define("union_au", AggregateKind::Union, &primitive_zoo(false, &abi))
        .unwrap();
    registry
        .define("union_b", AggregateKind::Union, &primitive_zoo(true, &abi))
        .unwrap();
    registry
        .define("struct_c", AggregateKind::Struct, &struct_c())
        .unwrap();

    let struct_a = registry.resolve("struct_a").unwrap().clone();
    let union_au = registry.resolve("union_au").unwrap().clone();
    registry
        .define(
            "struct_d",
            AggregateKind::Struct,
            &[
                FieldDescriptor::pointer("a", PointerTarget::Void),
                FieldDescriptor::pointer("b", PointerTarget::Aggregate("struct_a".to_string())),
                FieldDescriptor::pointer("b2", PointerTarget::Aggregate("union_au".to_string())),
                FieldDescriptor::array("c", FieldKind::Aggregate(struct_a), 10),
                FieldDescriptor::array("c2", FieldKind::Aggregate(union_au), 10),
                FieldDescriptor::array(
                    "c3",
                    FieldKind::Pointer(PointerTarget::Aggregate("union_au".to_string())),
                    10,
                ),
                FieldDescriptor::pointer("d", PointerTarget::Aggregate("struct_d".to_string())),
                FieldDescriptor::pointer("e", PointerTarget::Primitive(I32)),
                FieldDescriptor::array("f", FieldKind::Primitive(I32), 10),
                FieldDescriptor::array("f2", FieldKind::Pointer(PointerTarget::Primitive(I32)), 10),
                FieldDescriptor::primitive("g", I8),
                FieldDescriptor::pointer("h", PointerTarget::CString),
                FieldDescriptor::array("i", FieldKind::Primitive(I8), 32),
                FieldDescriptor::array("j", FieldKind::Pointer(PointerTarget::CString), 40),
            ],
        )
        .unwrap();

    registry
}

fn builder<'l>(registry: &'l TypeRegistry, name: &str) -> InstanceBuilder<'l> {
    InstanceBuilder::new(registry.resolve(name).unwrap(), *registry.abi())
}

fn dump_all(registry: &TypeRegistry, name: &str, base: u64, bytes: &[u8]) -> Result<String, DumpError> {
    let space = AddressSpace::new();
    let dumper = Dumper::new(registry, &space, DumpConfig::default());
    let mut out = String::new();
    dumper.dump(name, &MemoryRegion::new(base, bytes), &mut out)?;
    Ok(out)
}

#[test]
fn scenario_a_struct_of_primitives() {
    let registry = registry(TargetAbi::x86_64());
    let mut a = builder(&registry, "struct_a");
    a.set_int("a", 'a' as i128)
        .unwrap()
        .set_int("b", 98)
        .unwrap()
        .set_int("c", 0x63)
        .unwrap()
        .set_int("d", 0x640ff046)
        .unwrap()
        .set_int("e", 0x6545454545454565)
        .unwrap()
        .set_float("f", 10.0)
        .unwrap()
        .set_float("g", 10.0e-5)
        .unwrap()
        .set_bytes("h", &X87_1E_300)
        .unwrap();
    let bytes = a.finish();

    assert_eq!(
        dump_all(&registry, "struct_a", 0x601010, &bytes).unwrap(),
        "s: struct_a\n\
         v: a 97\n\
         v: b 98\n\
         v: c 99\n\
         v: d 1678766150\n\
         v: e 7297314935040984421\n\
         v: f 10.000000\n\
         v: g 0.000100\n\
         v: h 1e-300\n\
         o: struct_a 0x601010\n\
         t: sizeof 64\n\n"
    );
}

#[test]
fn scenario_b_union_overlay() {
    let registry = registry(TargetAbi::x86_64());
    let mut au = builder(&registry, "union_au");
    au.set_int("e", 0x6545454545454565).unwrap();
    let bytes = au.finish();

    let space = AddressSpace::new();
    let dumper = Dumper::new(&registry, &space, DumpConfig::default());
    let mut out = String::new();
    dumper
        .dump_fields(
            "union_au",
            "union_au",
            &MemoryRegion::new(0x602080, &bytes),
            &["d", "g", "h"],
            &mut out,
        )
        .unwrap();

    assert_eq!(
        out,
        "s: union_au\n\
         v: d 7297314935040984421\n\
         v: g 689551851887580425392854829170048810854389375237730582643655742644364158391699747312003669224107871834243458312257082595538218367647735257845376820422259120381817982149734174818304.000000\n\
         v: h 2.6600168985210386974e-4932\n\
         o: union_au 0x602080\n\
         t: sizeof 16\n\n"
    );
}

#[test]
fn union_of_signed_kinds_sees_last_store() {
    let registry = registry(TargetAbi::x86_64());
    let mut b = builder(&registry, "union_b");
    b.set_bytes("h", &X87_1E_300)
        .unwrap()
        .set_int("a", 'a' as i128)
        .unwrap()
        .set_int("b", -98)
        .unwrap()
        .set_int("c", 99)
        .unwrap()
        .set_int("e", -5)
        .unwrap();
    let bytes = b.finish();

    let space = AddressSpace::new();
    let dumper = Dumper::new(&registry, &space, DumpConfig::default());
    let mut out = String::new();
    dumper
        .dump_fields(
            "union_b",
            "union_b",
            &MemoryRegion::new(0x6020b0, &bytes),
            &["a", "b", "c", "d", "e"],
            &mut out,
        )
        .unwrap();

    assert_eq!(
        out,
        "s: union_b\nv: a -5\nv: b -5\nv: c -5\nv: d -5\nv: e -5\no: union_b 0x6020b0\nt: sizeof 16\n\n"
    );
}

fn populate_struct_c(registry: &TypeRegistry) -> Vec<u8> {
    let mut c = builder(registry, "struct_c");
    c.set_int("a1", 0xaaaaaaaa)
        .unwrap()
        .set_int("b1", 3)
        .unwrap()
        .set_int("c1", 8)
        .unwrap()
        .set_int("d1", 1)
        .unwrap()
        .set_int("a2", 'A' as i128)
        .unwrap()
        .set_int("b2", 3)
        .unwrap()
        .set_int("c2", 8)
        .unwrap()
        .set_int("d2", 1)
        .unwrap();
    c.finish()
}

fn dump_struct_c(registry: &TypeRegistry, bytes: &[u8]) -> String {
    let space = AddressSpace::new();
    let dumper = Dumper::new(registry, &space, DumpConfig::default());
    let mut out = String::new();
    dumper
        .dump_fields(
            "struct_c",
            "struct_c",
            &MemoryRegion::new(0x6020d0, bytes),
            &["a1", "b1", "c1", "d1", "a2", "b2", "c2", "d2"],
            &mut out,
        )
        .unwrap();
    out
}

const STRUCT_C_VALUES: &str = "s: struct_c\n\
    v: a1 2863311530\n\
    v: b1 3\n\
    v: c1 8\n\
    v: d1 1\n\
    v: a2 65\n\
    v: b2 3\n\
    v: c2 8\n\
    v: d2 1\n\
    o: struct_c 0x6020d0\n";

#[test]
fn scenario_c_bit_field_packing() {
    let registry = registry(TargetAbi::x86_64());
    let layout = registry.resolve("struct_c").unwrap();
    let slots: Vec<_> = ["b1", "c1", "d1", "b2", "c2"]
        .iter()
        .map(|name| {
            let slot = layout.fields[layout.field_index(name).unwrap()].bits.unwrap();
            (slot.unit_offset, slot.bit_offset)
        })
        .collect();

    // b1/c1/d1 share the unit after a1; the byte a2 closes it.
    assert_eq!(slots, vec![(4, 0), (4, 4), (4, 14), (12, 0), (12, 4)]);

    let bytes = populate_struct_c(&registry);
    assert_eq!(
        dump_struct_c(&registry, &bytes),
        format!("{}t: sizeof 32\n\n", STRUCT_C_VALUES)
    );
}

#[test]
fn scenario_c_with_sysv_packing() {
    let registry = registry(TargetAbi::x86_64().with_bitfield_packing(BitFieldPacking::SysV));
    let layout = registry.resolve("struct_c").unwrap();
    assert_eq!(layout.fields[layout.field_index("a2").unwrap()].offset, 6);
    assert_eq!(layout.fields[layout.field_index("h").unwrap()].offset, 12);

    let bytes = populate_struct_c(&registry);
    assert_eq!(
        dump_struct_c(&registry, &bytes),
        format!("{}t: sizeof 16\n\n", STRUCT_C_VALUES)
    );
}

#[test]
fn struct_d_layout() {
    let registry = registry(TargetAbi::x86_64());
    let layout = registry.resolve("struct_d").unwrap();
    let offsets: Vec<usize> = layout.fields.iter().map(|f| f.offset).collect();

    assert_eq!(
        offsets,
        vec![0, 8, 16, 32, 672, 832, 912, 920, 928, 968, 1048, 1056, 1064, 1096]
    );
    assert_eq!(layout.size, 1424);
    assert_eq!(layout.align, 16);
}

#[test]
fn struct_a_on_i386() {
    let registry = registry(TargetAbi::i386());
    let layout = registry.resolve("struct_a").unwrap();
    let offsets: Vec<usize> = layout.fields.iter().map(|f| f.offset).collect();

    assert_eq!(offsets, vec![0, 2, 4, 8, 12, 20, 24, 32]);
    assert_eq!(layout.size, 44);
    assert_eq!(registry.resolve("union_au").unwrap().size, 12);
}

#[test]
fn scenario_d_self_pointer_and_follow_through() {
    const BASE: u64 = 0x7000;
    const PTRA: u64 = 0x1000;
    const PTRAU: u64 = 0x2000;
    const PI: u64 = 0x3000;
    const PI2: u64 = 0x3010;
    const TXT: u64 = 0x4000;
    const TXT2: u64 = 0x4100;

    let registry = registry(TargetAbi::x86_64());

    let mut a = builder(&registry, "struct_a");
    a.set_int("e", 41).unwrap();
    let ptra = a.finish();
    let mut au = builder(&registry, "union_au");
    au.set_int("e", 42).unwrap();
    let ptrau = au.finish();
    let pi = 101i32.to_le_bytes();
    let pi2 = 102i32.to_le_bytes();
    let txt = b"lorem ipsum\0";
    let txt2 = b"lorem ipsum 2\0";

    let mut d = builder(&registry, "struct_d");
    d.set_pointer("a", 0xaaaaaaaa)
        .unwrap()
        .set_pointer("b", PTRA)
        .unwrap()
        .set_pointer("b2", PTRAU)
        .unwrap();
    for i in 0..10 {
        let mut element = builder(&registry, "struct_a");
        element.set_int("a", i as i128).unwrap().set_int("e", 40).unwrap();
        d.set_element_bytes("c", i, element.bytes()).unwrap();

        let mut overlay = builder(&registry, "union_au");
        overlay.set_int("e", 39).unwrap();
        d.set_element_bytes("c2", i, overlay.bytes()).unwrap();

        d.set_element_int("f", i, 66).unwrap();
        d.set_element_pointer("f2", i, PI).unwrap();
        d.set_element_pointer("c3", i, PTRAU).unwrap();
    }
    d.set_pointer("d", BASE)
        .unwrap()
        .set_pointer("e", PI)
        .unwrap()
        .set_element_pointer("f2", 9, PI2)
        .unwrap()
        .set_int("g", 'g' as i128)
        .unwrap()
        .set_pointer("h", TXT)
        .unwrap()
        .set_bytes("i", txt2)
        .unwrap();
    for i in 0..40 {
        d.set_element_pointer("j", i, if i % 2 == 0 { TXT } else { TXT2 })
            .unwrap();
    }
    let bytes = d.finish();

    let space = AddressSpace::new()
        .with(MemoryRegion::new(PTRA, &ptra))
        .with(MemoryRegion::new(PTRAU, &ptrau))
        .with(MemoryRegion::new(PI, &pi))
        .with(MemoryRegion::new(PI2, &pi2))
        .with(MemoryRegion::new(TXT, txt))
        .with(MemoryRegion::new(TXT2, txt2))
        .with(MemoryRegion::new(BASE, &bytes));
    let dumper = Dumper::new(&registry, &space, DumpConfig::following_pointers());
    let mut out = String::new();
    dumper
        .dump_fields(
            "struct_d",
            "struct_d",
            &MemoryRegion::new(BASE, &bytes),
            &["a", "b", "d", "e", "f2", "g", "h"],
            &mut out,
        )
        .unwrap();

    let f2 = format!("[{}0x3010 -> 102]", "0x3000 -> 101, ".repeat(9));
    assert_eq!(
        out,
        format!(
            "s: struct_d\n\
             v: a 0xaaaaaaaa\n\
             v: b 0x1000 -> {{a 0, b 0, c 0, d 0, e 41, f 0.000000, g 0.000000, h 0e0}}\n\
             v: d 0x7000\n\
             v: e 0x3000 -> 101\n\
             v: f2 {}\n\
             v: g 103\n\
             v: h 0x4000 -> \"lorem ipsum\"\n\
             o: struct_d 0x7000\n\
             t: sizeof 1424\n\n",
            f2
        )
    );

    let mut all = String::new();
    dumper
        .dump("struct_d", &MemoryRegion::new(BASE, &bytes), &mut all)
        .unwrap();
    assert!(all.contains("v: j [0x4000 -> \"lorem ipsum\", 0x4100 -> \"lorem ipsum 2\", "));
    assert!(all.ends_with("o: struct_d 0x7000\nt: sizeof 1424\n\n"));
}

#[test]
fn unnormal_long_double_fails_the_dump() {
    let registry = registry(TargetAbi::x86_64());
    let mut au = builder(&registry, "union_au");
    au.set_int("e", 0x6545454545454565)
        .unwrap()
        .set_bytes("h", &[0x65, 0x45, 0x45, 0x45, 0x45, 0x45, 0x45, 0x65, 0x01, 0x00])
        .unwrap();
    let bytes = au.finish();

    let result = dump_all(&registry, "union_au", 0x602080, &bytes);
    assert!(matches!(
        result,
        Err(DumpError::Format(FormatError::Unrepresentable { ref field, .. })) if field == "h"
    ));
}
