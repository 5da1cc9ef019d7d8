use ephe::header::CHECKSUM_SIZE;
use ephe::quantize::truncate;
use ephe::{
    create_tile, decode_tile, encode_tile, read_tile, Column, EncodeOptions, EphError, Nuniq,
    Record, Schema, TileStore, Unit, Value,
};
use proptest::prelude::*;
use std::fs;
use tempfile::tempdir;

fn star_schema() -> Schema {
    Schema::new(vec![
        Column::int32("hip"),
        Column::int32("hd"),
        Column::float32("vmag").with_unit(Unit::VMAG).with_zerobits(16),
        Column::float32("ra").with_unit(Unit::RAD).with_zerobits(8),
        Column::float32("de").with_unit(Unit::RAD).with_zerobits(8),
        Column::float32("plx").with_unit(Unit::ARCSEC).with_zerobits(16),
        Column::float32("pra").with_unit(Unit::RAD_PER_YEAR).with_zerobits(16),
        Column::float32("pde").with_unit(Unit::RAD_PER_YEAR).with_zerobits(16),
        Column::float32("bv"),
        Column::uint64("gaia"),
        Column::bytes("ids", 16),
    ])
    .unwrap()
}

fn star(i: i32) -> Record {
    let f = i as f32;
    Record::from([
        ("hip".to_string(), Value::Int32(1000 + i)),
        ("hd".to_string(), Value::Int32(-i)),
        ("vmag".to_string(), Value::Float32(6.5 - f * 0.01)),
        ("ra".to_string(), Value::Float32(0.1 + f * 0.003)),
        ("de".to_string(), Value::Float32(-0.5 + f * 0.001)),
        ("plx".to_string(), Value::Float32(0.012 * f)),
        ("pra".to_string(), Value::Float32(1e-8 * f)),
        ("pde".to_string(), Value::Float32(-2e-8 * f)),
        ("bv".to_string(), Value::Float32(0.65 + f * 1e-4)),
        ("gaia".to_string(), Value::UInt64(4_295_806_720 + i as u64 * 977)),
        ("ids".to_string(), Value::from(format!("HIP {}", 1000 + i).as_str())),
    ])
}

/// What the decoder should hand back for `record` under `schema`.
fn expected(schema: &Schema, record: &Record) -> Record {
    let mut out = record.clone();
    for col in schema.columns() {
        if let Some(Value::Float32(v)) = out.get_mut(&col.id) {
            *v = truncate(*v, col.zerobits);
        }
    }
    out
}

#[test]
fn test_create_and_read_tile() {
    let dir = tempdir().unwrap();
    let schema = star_schema();
    let records: Vec<Record> = (0..500).map(star).collect();

    let path = create_tile(&records, "STAR", 20, dir.path(), &schema).unwrap();
    assert_eq!(path, dir.path().join("Norder1/Dir0/Npix4.eph"));
    assert!(path.is_file());

    let tile = read_tile(&path).unwrap();
    assert_eq!(tile.chunk_type_str(), "STAR");
    assert_eq!(tile.nuniq().unwrap(), Nuniq::new(20).unwrap());
    assert_eq!(tile.header.row_count, 500);
    assert_eq!(tile.header.row_size as usize, schema.row_size());
    assert_eq!(tile.records.len(), 500);
    for (got, rec) in tile.records.iter().zip(&records) {
        assert_eq!(got, &expected(&schema, rec));
    }
    // Unquantized columns are bit exact.
    assert_eq!(tile.records[7]["bv"], records[7]["bv"]);
    assert_eq!(tile.records[7]["gaia"], records[7]["gaia"]);
}

#[test]
fn test_three_row_scenario() {
    let dir = tempdir().unwrap();
    let schema = Schema::new(vec![
        Column::int32("hip"),
        Column::float32("vmag").with_unit(Unit::VMAG).with_zerobits(16),
    ])
    .unwrap();
    let records: Vec<Record> = [(71683, -0.01f32), (91262, 0.03), (24436, 0.18)]
        .iter()
        .map(|&(hip, vmag)| {
            Record::from([
                ("hip".to_string(), Value::Int32(hip)),
                ("vmag".to_string(), Value::Float32(vmag)),
            ])
        })
        .collect();

    let path = create_tile(&records, "STAR", 10, dir.path(), &schema).unwrap();
    assert_eq!(path, dir.path().join("Norder0").join("Dir0").join("Npix6.eph"));

    let tile = read_tile(&path).unwrap();
    assert_eq!(tile.header.row_size, 8);
    assert_eq!(tile.header.column_count, 2);
    assert_eq!(tile.header.row_count, 3);
    for (got, rec) in tile.records.iter().zip(&records) {
        let Value::Float32(v) = rec["vmag"] else { unreachable!() };
        assert_eq!(got["vmag"], Value::Float32(truncate(v, 16)));
        assert_eq!(got["hip"], rec["hip"]);
    }
}

#[test]
fn test_schema_survives_reopen() {
    let dir = tempdir().unwrap();
    let schema = star_schema();
    let path = create_tile(&[star(1)], "STAR", 4, dir.path(), &schema).unwrap();

    // Fresh read from disk: nothing is cached between calls.
    let bytes = fs::read(&path).unwrap();
    let tile = decode_tile(&bytes).unwrap();
    let ids: Vec<&str> = tile.columns.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["hip", "hd", "vmag", "ra", "de", "plx", "pra", "pde", "bv", "gaia", "ids"]);

    let decoded = tile.schema().unwrap();
    for (a, b) in decoded.columns().iter().zip(schema.columns()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.ty, b.ty);
        assert_eq!(a.unit, b.unit);
    }
    assert_eq!(decoded.descriptors(), schema.descriptors());
}

#[test]
fn test_encoding_is_deterministic() {
    let schema = star_schema();
    let records: Vec<Record> = (0..50).map(star).collect();
    let key = Nuniq::new(300).unwrap();
    let a = encode_tile(&records, "STAR", key, &schema, &EncodeOptions::default()).unwrap();
    let b = encode_tile(&records, "STAR", key, &schema, &EncodeOptions::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(&a[a.len() - CHECKSUM_SIZE..], &[0u8; 4]);
}

#[test]
fn test_shuffle_helps_compression() {
    let schema = star_schema();
    let records: Vec<Record> = (0..1000).map(star).collect();
    let rows = ephe::row::encode_rows(&schema, &records).unwrap();
    let codec = ephe::codec::DeflateCodec::default();
    let plain = codec.compress(&rows).unwrap();
    let shuffled = codec
        .compress(&ephe::shuffle::shuffle(&rows, schema.row_size()).unwrap())
        .unwrap();
    assert!(shuffled.len() < plain.len(), "{} !< {}", shuffled.len(), plain.len());
}

#[test]
fn test_missing_column_writes_nothing() {
    let dir = tempdir().unwrap();
    let mut bad = star(3);
    bad.remove("plx");
    let records = vec![star(1), bad];
    let err = create_tile(&records, "STAR", 4, dir.path(), &star_schema()).unwrap_err();
    assert!(matches!(err, EphError::SchemaMismatch { ref column } if column == "plx"));
    assert!(!dir.path().join("Norder0").exists());
}

#[test]
fn test_string_too_long() {
    let dir = tempdir().unwrap();
    let mut rec = star(1);
    rec.insert("ids".into(), Value::from("HIP 1001 | HD 12345"));
    let err = create_tile(&[rec], "STAR", 4, dir.path(), &star_schema()).unwrap_err();
    assert!(matches!(err, EphError::ValueTooLong { ref column, size: 16, .. } if column == "ids"));
}

#[test]
fn test_bad_magic_and_version() {
    let dir = tempdir().unwrap();
    let path = create_tile(&[star(1)], "STAR", 4, dir.path(), &star_schema()).unwrap();
    let mut bytes = fs::read(&path).unwrap();

    bytes[3] = b'X';
    assert!(matches!(decode_tile(&bytes), Err(EphError::BadMagic { .. })));

    bytes[3] = b'E';
    bytes[4] = 3;
    assert!(matches!(decode_tile(&bytes), Err(EphError::UnsupportedVersion(3))));

    let not_a_tile = dir.path().join("readme.eph");
    fs::write(&not_a_tile, b"hello world").unwrap();
    assert!(matches!(read_tile(&not_a_tile), Err(EphError::BadMagic { .. })));
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Norder0/Dir0/Npix0.eph");
    match read_tile(&path) {
        Err(EphError::Io { path: p, .. }) => assert_eq!(p, path),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_invalid_nuniq() {
    let dir = tempdir().unwrap();
    let err = create_tile(&[], "STAR", 3, dir.path(), &star_schema()).unwrap_err();
    assert!(matches!(err, EphError::InvalidNuniq(3)));
}

#[test]
fn test_store_lists_and_describes_tiles() {
    let dir = tempdir().unwrap();
    let store = TileStore::open(dir.path());
    let schema = star_schema();
    let high = Nuniq::from_order_pix(7, 150_001).unwrap().get();
    for key in [4, 20, high] {
        store.write("STAR", key, &schema, &[star((key % 97) as i32)]).unwrap();
    }
    assert!(store.contains(20));
    assert!(!store.contains(21));
    assert!(store.path(high).unwrap().ends_with("Norder7/Dir150000/Npix150001.eph"));

    let keys: Vec<u64> = store.list().unwrap().iter().map(|k| k.get()).collect();
    assert_eq!(keys, vec![4, 20, high]);
    assert_eq!(store.read(20).unwrap().records.len(), 1);

    let props = ephe::properties::HipsProperties::new("stars");
    let path = store.write_properties(props).unwrap();
    let text = fs::read_to_string(path).unwrap();
    assert!(text.contains("hips_order_min           = 0\n"));
    assert!(text.contains("hips_order               = 7\n"));
    assert!(text.contains("hips_tile_format         = eph\n"));

    // The properties file is not mistaken for a tile.
    assert_eq!(store.list().unwrap().len(), 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip(
        rows in prop::collection::vec(
            (any::<i32>(), any::<f32>(), any::<u64>(), "[a-zA-Z0-9 ]{0,8}", 0u32..24),
            0..40,
        ),
        zerobits in 0u32..24,
    ) {
        let schema = Schema::new(vec![
            Column::int32("i"),
            Column::float32("f").with_zerobits(zerobits),
            Column::uint64("q"),
            Column::bytes("s", 8),
            Column::float32("g"),
        ]).unwrap();
        let records: Vec<Record> = rows
            .iter()
            .map(|(i, f, q, s, g)| Record::from([
                ("i".to_string(), Value::Int32(*i)),
                ("f".to_string(), Value::Float32(*f)),
                ("q".to_string(), Value::UInt64(*q)),
                ("s".to_string(), Value::from(s.as_str())),
                ("g".to_string(), Value::Float32(*g as f32 * 0.25)),
            ]))
            .collect();

        let bytes = encode_tile(&records, "TEST", Nuniq::new(4).unwrap(), &schema, &EncodeOptions::default()).unwrap();
        let tile = decode_tile(&bytes).unwrap();
        prop_assert_eq!(tile.records.len(), records.len());
        for (got, rec) in tile.records.iter().zip(&records) {
            let Value::Float32(f) = rec["f"] else { unreachable!() };
            let Value::Float32(gf) = got["f"] else { unreachable!() };
            // Compare bit patterns so NaN payloads count as equal.
            prop_assert_eq!(gf.to_bits(), truncate(f, zerobits).to_bits());
            prop_assert_eq!(&got["i"], &rec["i"]);
            prop_assert_eq!(&got["q"], &rec["q"]);
            prop_assert_eq!(&got["s"], &rec["s"]);
            prop_assert_eq!(&got["g"], &rec["g"]);
        }
    }
}
