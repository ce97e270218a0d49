// Licensed under the Apache-2.0 license

//! Tests for the context builder.

mod test {
    use super::super::{build_contexts, AddrMapContext, NodeType, TopContext};
    use crate::error::ContextError;
    use crate::types::World;
    use crate::util::{AccessMode, FixedPoint};

    fn build(input: &str) -> TopContext {
        let world = World::from_json_str(input).unwrap();
        build_contexts(&world, ".").unwrap()
    }

    fn build_err(input: &str) -> ContextError {
        let world = World::from_json_str(input).unwrap();
        build_contexts(&world, ".").unwrap_err()
    }

    fn top_map(top: &TopContext) -> &AddrMapContext {
        top.top().unwrap()
    }

    /// Wrap children in a top address map on access channel 0.
    fn design(children: &str) -> String {
        format!(
            r#"{{"kind": "addrmap", "type_name": "TOP", "inst_name": "top", "size": 256,
                "properties": {{"desyrdl_access_channel": 0}},
                "children": [{children}]}}"#
        )
    }

    /// A 32-bit register with one rw/r field spanning the whole word.
    fn word_reg(type_name: &str, inst_name: &str, offset: u64) -> String {
        format!(
            r#"{{"kind": "reg", "type_name": "{type_name}", "inst_name": "{inst_name}",
                "address_offset": {offset}, "size": 4,
                "children": [{{"kind": "field", "type_name": "data_t", "inst_name": "data",
                    "low": 0, "high": 31, "sw": "rw", "hw": "r"}}]}}"#
        )
    }

    #[test]
    fn test_end_to_end_registers() {
        let input = r#"{
            "kind": "addrmap", "type_name": "TOP", "inst_name": "TOP", "size": 64,
            "address_offset": 4096,
            "properties": {"desyrdl_access_channel": 0},
            "children": [
                {"kind": "reg", "type_name": "CTRL", "inst_name": "CTRL", "address_offset": 0, "size": 4,
                 "children": [
                    {"kind": "field", "type_name": "mode_t", "inst_name": "mode",
                     "low": 0, "high": 7, "sw": "rw", "hw": "r", "reset": 5}
                 ]},
                {"kind": "reg", "type_name": "STATUS", "inst_name": "STATUS", "address_offset": 16,
                 "size": 4, "array_dimensions": [4], "array_stride": 4,
                 "children": [
                    {"kind": "field", "type_name": "value_t", "inst_name": "value",
                     "low": 0, "high": 31, "sw": "r", "hw": "w"}
                 ]}
            ]
        }"#;
        let top = build(input);
        let map = top_map(&top);

        let offsets: Vec<u64> = map.regs.iter().map(|r| r.address_offset).collect();
        assert_eq!(offsets, vec![0x00, 0x10, 0x14, 0x18, 0x1c]);
        let absolute: Vec<u64> = map.regs.iter().map(|r| r.absolute_address).collect();
        assert_eq!(absolute, vec![0x1000, 0x1010, 0x1014, 0x1018, 0x101c]);
        let idx: Vec<usize> = map.regs.iter().map(|r| r.idx).collect();
        assert_eq!(idx, vec![0, 1, 2, 3, 4]);

        assert_eq!(map.regs[0].register().unwrap().reset, 0x05);
        assert_eq!(map.regs[0].width, 8);
        assert_eq!(map.regs[1].width, 32);
        assert_eq!(map.reg_type_names, vec!["CTRL", "STATUS"]);
        assert_eq!(map.reg_types.len(), 2);
        assert_eq!(map.n_regs, 5);
        assert_eq!(map.n_reg_insts, 2);

        let status = &map.reg_insts[1];
        assert_eq!(status.idx, 1);
        assert_eq!(status.dimensions.elements, 4);
        assert_eq!(status.dimensions.dim, 2);
        assert_eq!(status.total_size, 16);
        assert_eq!(status.total_words, 4);
        assert_eq!(status.address_offset_high, 0x1f);
        assert_eq!(map.regs[2].address_offset_high, 0x17);
        assert_eq!(map.regs[2].absolute_address_high, 0x1017);
        // scalars keep the bound computed from their own size
        assert_eq!(map.regs[0].address_offset_high, 0x03);
    }

    #[test]
    fn test_two_dimensional_array() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "grid", "address_offset": 32,
                "size": 4, "array_dimensions": [2, 3], "array_stride": 8,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "r", "hw": "w"}]}"#,
        );
        let top = build(&input);
        let map = top_map(&top);
        let grid = &map.reg_insts[0];
        assert_eq!(grid.dimensions.dim_n, 2);
        assert_eq!(grid.dimensions.dim_m, 3);
        assert_eq!(grid.dimensions.dim, 3);
        let offsets: Vec<u64> = map.regs.iter().map(|r| r.address_offset).collect();
        assert_eq!(offsets, vec![32, 40, 48, 56, 64, 72]);
    }

    #[test]
    fn test_more_than_two_dimensions_rejected() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "cube", "size": 4,
                "array_dimensions": [2, 2, 2], "array_stride": 4,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "r", "hw": "w"}]}"#,
        );
        assert!(matches!(
            build_err(&input),
            ContextError::UnsupportedShape(_)
        ));
    }

    #[test]
    fn test_stride_smaller_than_element_rejected() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 8,
                "array_dimensions": [2], "array_stride": 4,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "r", "hw": "w"}]}"#,
        );
        assert!(matches!(
            build_err(&input),
            ContextError::UnsupportedShape(_)
        ));
    }

    #[test]
    fn test_mask_and_reset() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "children": [
                    {"kind": "field", "type_name": "lo", "inst_name": "lo",
                     "low": 0, "high": 3, "sw": "rw", "hw": "r", "reset": 5},
                    {"kind": "field", "type_name": "hi", "inst_name": "hi",
                     "low": 4, "high": 7, "sw": "rw", "hw": "r", "reset": 10}
                ]}"#,
        );
        let top = build(&input);
        let reg = top_map(&top).regs[0].register().unwrap();
        assert_eq!(reg.fields[0].mask, 0xf);
        assert_eq!(reg.fields[0].mask_hex, "0xf");
        assert_eq!(reg.fields[1].mask, 0xf0);
        assert_eq!(reg.fields[0].reset, 5);
        assert_eq!(reg.fields[1].width, 4);
        assert_eq!(reg.reset, 0xa5);
        assert_eq!(reg.reset_hex, "0xa5");
        assert_eq!(reg.fields_count, 2);
    }

    #[test]
    fn test_single_field_mask_reset() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 3, "sw": "rw", "hw": "r", "reset": 5}]}"#,
        );
        let top = build(&input);
        let reg = top_map(&top).regs[0].register().unwrap();
        assert_eq!(reg.fields[0].mask, 0xf);
        assert_eq!(reg.reset, 0x5);
    }

    #[test]
    fn test_negative_field_reset() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 31, "sw": "rw", "hw": "r", "reset": 2147483648}]}"#,
        );
        let top = build(&input);
        let reg = top_map(&top).regs[0].register().unwrap();
        assert_eq!(reg.fields[0].reset, -2147483648);
        assert_eq!(reg.fields[0].reset_hex, "-0x80000000");
        assert_eq!(reg.reset, 0x8000_0000);
    }

    #[test]
    fn test_register_access_modes() {
        let reg = |name: &str, offset: u64, sw: &str, hw: &str| {
            format!(
                r#"{{"kind": "reg", "type_name": "{name}", "inst_name": "{name}",
                    "address_offset": {offset}, "size": 4,
                    "children": [{{"kind": "field", "type_name": "f", "inst_name": "f",
                        "low": 0, "high": 0, "sw": "{sw}", "hw": "{hw}"}}]}}"#
            )
        };
        let input = design(&[
            reg("write_only", 0, "w", "r"),
            reg("read_write", 4, "rw", "r"),
            reg("read_only", 8, "r", "w"),
            reg("no_access", 12, "na", "r"),
        ]
        .join(","));
        let top = build(&input);
        let map = top_map(&top);
        let modes: Vec<AccessMode> = map.regs.iter().map(|r| r.rw).collect();
        assert_eq!(
            modes,
            vec![
                AccessMode::WO,
                AccessMode::RW,
                AccessMode::RO,
                AccessMode::RW
            ]
        );

        let field = &map.regs[2].register().unwrap().fields[0];
        assert_eq!(field.rw, AccessMode::RO);
        assert_eq!(field.hw_rw, AccessMode::WO);
        assert_eq!(field.constant, 0);
        let field = &map.regs[0].register().unwrap().fields[0];
        assert_eq!(field.constant, 1);
    }

    #[test]
    fn test_type_dedup() {
        let input = design(
            &[
                word_reg("CTRL_REG", "ctrl0", 0),
                word_reg("CTRL_REG", "ctrl1", 4),
                word_reg("STATUS_REG", "status", 8),
                word_reg("CTRL_REG", "ctrl2", 12),
            ]
            .join(","),
        );
        let top = build(&input);
        let map = top_map(&top);
        assert_eq!(map.reg_types.len(), 2);
        assert_eq!(map.reg_type_names, vec!["CTRL_REG", "STATUS_REG"]);
        assert_eq!(map.reg_types[0].inst_name, "ctrl0");
        assert_eq!(map.reg_insts.len(), 4);
        assert_eq!(map.n_reg_insts, 4);
    }

    #[test]
    fn test_interface_adapters() {
        let sub = |name: &str, offset: u64, interface: &str| {
            format!(
                r#"{{"kind": "addrmap", "type_name": "{name}_t", "inst_name": "{name}",
                    "address_offset": {offset}, "size": 64,
                    "properties": {{"desyrdl_interface": "{interface}"}}}}"#
            )
        };
        let input = format!(
            r#"{{"kind": "addrmap", "type_name": "TOP", "inst_name": "top", "size": 256,
                "properties": {{"desyrdl_access_channel": 0, "desyrdl_interface": "AXI"}},
                "children": [{}, {}, {}]}}"#,
            sub("dma", 0, "Avalon"),
            sub("fifo", 64, "Avalon"),
            sub("ctrl", 128, "AXI"),
        );
        let top = build(&input);
        let map = top_map(&top);
        assert_eq!(map.interface_adapters, vec!["axi_to_avalon"]);
        assert_eq!(top.interface_adapters, vec!["axi_to_avalon"]);
        assert_eq!(map.n_ext_insts, 3);
        assert_eq!(map.exts[0].node_type, NodeType::AddrMap);
        assert_eq!(map.ext_type_names, vec!["dma_t", "fifo_t", "ctrl_t"]);
    }

    #[test]
    fn test_adapter_needs_both_interfaces() {
        let input = design(
            r#"{"kind": "addrmap", "type_name": "sub_t", "inst_name": "sub", "size": 64,
                "properties": {"desyrdl_interface": "Avalon"}}"#,
        );
        let top = build(&input);
        assert!(top.interface_adapters.is_empty());
    }

    #[test]
    fn test_post_order_and_paths() {
        let input = r#"{
            "kind": "addrmap", "type_name": "TOP", "inst_name": "top", "size": 4096,
            "properties": {"desyrdl_access_channel": 3},
            "children": [
                {"kind": "addrmap", "type_name": "a_t", "inst_name": "a", "size": 256,
                 "children": [
                    {"kind": "addrmap", "type_name": "inner_t", "inst_name": "inner",
                     "size": 16, "properties": {"desyrdl_access_channel": 1}}
                 ]},
                {"kind": "addrmap", "type_name": "b_t", "inst_name": "b", "address_offset": 256,
                 "size": 256}
            ]
        }"#;
        let world = World::from_json_str(input).unwrap();
        let top = build_contexts(&world, "_").unwrap();
        let names: Vec<&str> = top.addrmaps.iter().map(|m| m.inst_name.as_str()).collect();
        assert_eq!(names, vec!["inner", "a", "b", "top"]);

        let inner = &top.addrmaps[0];
        assert_eq!(inner.path_segments, vec!["top", "a", "inner"]);
        assert_eq!(inner.path, "top_a_inner");
        assert_eq!(inner.path_notop, "a_inner");
        assert_eq!(inner.path_addrmap_name, "inner");
        assert_eq!(inner.access_channel, 1);
        assert_eq!(inner.addrwidth, 4);

        let root = top.top().unwrap();
        assert_eq!(root.path_notop, "");
        assert_eq!(root.addrwidth, 12);
        assert_eq!(top.access_channel, Some(3));
        assert_eq!(top.separator, "_");
    }

    #[test]
    fn test_missing_access_channel() {
        let input = r#"{"kind": "addrmap", "type_name": "TOP", "inst_name": "top", "size": 16,
            "children": [{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "rw", "hw": "r"}]}]}"#;
        let err = build_err(input);
        assert!(matches!(err, ContextError::Configuration(_)));
        assert!(err.to_string().contains("access channel"));
    }

    #[test]
    fn test_unknown_tool_property() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "properties": {"desyrdl_colour": "blue"},
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "rw", "hw": "r"}]}"#,
        );
        assert!(matches!(
            build_err(&input),
            ContextError::Configuration(_)
        ));
    }

    #[test]
    fn test_extension_properties_copied() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "properties": {"ispresent": true, "owner": "fw"},
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "rw", "hw": "r",
                    "properties": {"we": true, "incrwidth": 2}}]}"#,
        );
        let top = build(&input);
        let reg = &top_map(&top).regs[0];
        assert!(reg.properties.contains_key("owner"));
        let json = serde_json::to_value(reg).unwrap();
        assert_eq!(json["owner"], "fw");
        assert_eq!(json["node_type"], "REG");
        assert_eq!(json["fields"][0]["incrwidth"], 2);
        assert_eq!(json["fields"][0]["const"], 1);
    }

    #[test]
    fn test_free_form_properties_copied() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "properties": {"gain": 1.5, "tags": ["a", "b"]},
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "rw", "hw": "r",
                    "properties": {"we": true, "limits": {"lo": -1.0}}}]}"#,
        );
        let top = build(&input);
        let json = serde_json::to_value(&top_map(&top).regs[0]).unwrap();
        assert_eq!(json["gain"], 1.5);
        assert_eq!(json["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(json["fields"][0]["limits"]["lo"], -1.0);
    }

    #[test]
    fn test_free_form_value_on_tool_property() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "properties": {"desyrdl_data_type": [1, 2]},
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "rw", "hw": "r"}]}"#,
        );
        let err = build_err(&input);
        assert!(matches!(err, ContextError::Configuration(_)));
        assert!(err.to_string().contains("desyrdl_data_type"));
        assert!(err.to_string().contains("'r'"));
    }

    #[test]
    fn test_array_span_overflow_rejected() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 4,
                "array_dimensions": [4], "array_stride": 4611686018427387904,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "rw", "hw": "r"}]}"#,
        );
        assert!(matches!(
            build_err(&input),
            ContextError::UnsupportedShape(_)
        ));
    }

    #[test]
    fn test_item_end_overflow_rejected() {
        let input = design(
            r#"{"kind": "reg", "type_name": "R", "inst_name": "r", "size": 8,
                "address_offset": 18446744073709551612,
                "children": [{"kind": "field", "type_name": "f", "inst_name": "f",
                    "low": 0, "high": 0, "sw": "rw", "hw": "r"}]}"#,
        );
        let err = build_err(&input);
        assert!(matches!(err, ContextError::UnsupportedShape(_)));
        assert!(err.to_string().contains("'r'"));
    }

    #[test]
    fn test_memory_address_overflow_rejected() {
        let input = design(
            r#"{"kind": "mem", "type_name": "m", "inst_name": "m", "size": 4,
                "mementries": 9223372036854775808, "memwidth": 32}"#,
        );
        assert!(matches!(
            build_err(&input),
            ContextError::UnsupportedShape(_)
        ));
    }

    #[test]
    fn test_write_enable_lint() {
        let field = |name: &str, low: u32, extra: &str| {
            format!(
                r#"{{"kind": "field", "type_name": "f", "inst_name": "{name}",
                    "low": {low}, "high": {low}, "sw": "rw", "hw": "w"{extra}}}"#
            )
        };
        let input = design(&format!(
            r#"{{"kind": "reg", "type_name": "R", "inst_name": "shared", "size": 4,
                "children": [{}, {}, {}]}}"#,
            field("plain", 0, ""),
            field("guarded", 1, r#", "properties": {"we": true}"#),
            field("shadow", 2, r#", "virtual": true"#),
        ));
        let top = build(&input);
        assert_eq!(top.lints.len(), 1);
        assert_eq!(top.lints[0].register, "shared");
        assert_eq!(top.lints[0].field, "plain");
        assert!(top.lints[0].message.contains("'sw = rw'"));
        // generation still produced the register
        assert_eq!(top_map(&top).n_regs, 1);
    }

    #[test]
    fn test_memory_with_registers() {
        let input = design(&format!(
            r#"{{"kind": "mem", "type_name": "buf_t", "inst_name": "buf", "address_offset": 128,
                "size": 1024, "mementries": 256, "memwidth": 16, "sw": "r",
                "properties": {{"desyrdl_data_type": "fixed-4"}},
                "children": [{}, {}]}}"#,
            word_reg("CSR", "csr0", 0),
            word_reg("CSR", "csr1", 4),
        ));
        let top = build(&input);
        let map = top_map(&top);
        assert_eq!(map.n_mems, 1);
        let mem = &map.mems[0];
        assert_eq!(mem.node_type, NodeType::Memory);
        assert_eq!(mem.width, 16);
        assert_eq!(mem.rw, AccessMode::RO);
        assert_eq!(mem.signed, 1);
        assert_eq!(mem.fixedpoint, FixedPoint::Scale(-4));
        let json = serde_json::to_value(mem).unwrap();
        assert_eq!(json["entries"], 256);
        assert_eq!(json["addresses"], 1024);
        assert_eq!(json["addrwidth"], 10);
        assert_eq!(json["datawidth"], 16);

        let block = mem.block().unwrap();
        assert_eq!(block.n_reg_insts, 2);
        assert_eq!(block.reg_type_names, vec!["CSR"]);
        assert_eq!(block.regs[1].absolute_address, 0x84);
    }

    #[test]
    fn test_memory_without_entries() {
        let input = design(
            r#"{"kind": "mem", "type_name": "m", "inst_name": "m", "size": 4,
                "mementries": 0, "memwidth": 32}"#,
        );
        assert!(matches!(
            build_err(&input),
            ContextError::UnsupportedShape(_)
        ));
    }

    #[test]
    fn test_register_file_array() {
        let input = design(&format!(
            r#"{{"kind": "regfile", "type_name": "chan_t", "inst_name": "chan",
                "address_offset": 64, "size": 8, "array_dimensions": [3], "array_stride": 16,
                "children": [{}, {}]}}"#,
            word_reg("CFG", "cfg", 0),
            word_reg("STAT", "stat", 4),
        ));
        let top = build(&input);
        let map = top_map(&top);
        assert_eq!(map.n_rgf_insts, 1);
        assert_eq!(map.n_regf, 3);
        assert_eq!(map.n_regf_regs, 6);
        let offsets: Vec<u64> = map.regf.iter().map(|r| r.address_offset).collect();
        assert_eq!(offsets, vec![64, 80, 96]);
        let block = map.regf[0].block().unwrap();
        assert_eq!(block.reg_type_names, vec!["CFG", "STAT"]);
        assert_eq!(block.regs[1].address_offset, 4);
    }

    #[test]
    fn test_register_file_rejects_nested_files() {
        let input = design(
            r#"{"kind": "regfile", "type_name": "outer", "inst_name": "outer", "size": 8,
                "children": [{"kind": "regfile", "type_name": "inner", "inst_name": "inner",
                    "size": 4}]}"#,
        );
        assert!(matches!(
            build_err(&input),
            ContextError::UnsupportedShape(_)
        ));
    }

    #[test]
    fn test_instance_indices() {
        let input = design(&format!(
            r#"{}, {{"kind": "addrmap", "type_name": "sub_t", "inst_name": "sub",
                "address_offset": 128, "size": 64}},
               {{"kind": "regfile", "type_name": "rf_t", "inst_name": "rf",
                "address_offset": 64, "size": 4, "children": [{}]}},
               {}, {{"kind": "mem", "type_name": "m_t", "inst_name": "m",
                "address_offset": 192, "size": 64, "mementries": 16, "memwidth": 32}}"#,
            word_reg("A", "a", 0),
            word_reg("C", "c", 0),
            word_reg("B", "b", 4),
        ));
        let top = build(&input);
        let map = top_map(&top);

        let declared: Vec<(&str, usize)> = map
            .insts
            .iter()
            .map(|i| (i.inst_name.as_str(), i.inst_idx))
            .collect();
        // unroll order is registers, memories, register files, sub-maps
        assert_eq!(
            declared,
            vec![("a", 0), ("sub", 4), ("rf", 3), ("b", 1), ("m", 2)]
        );
        assert_eq!(map.reg_insts[1].idx, 1);
        assert_eq!(map.mem_insts[0].idx, 0);
    }

    #[test]
    fn test_zero_sized_map() {
        let input = r#"{"kind": "addrmap", "type_name": "TOP", "inst_name": "top", "size": 0,
            "properties": {"desyrdl_access_channel": 0}}"#;
        assert!(matches!(
            build_err(input),
            ContextError::Configuration(_)
        ));
    }

    #[test]
    fn test_generate_hdl_flag() {
        let input = r#"{"kind": "addrmap", "type_name": "TOP", "inst_name": "top", "size": 16,
            "properties": {"desyrdl_access_channel": 0, "desyrdl_generate_hdl": false}}"#;
        let top = build(input);
        assert!(!top_map(&top).generate_hdl);

        let top = build(&design(""));
        assert!(top_map(&top).generate_hdl);
    }
}
