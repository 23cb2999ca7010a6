//! Wire message fixtures for testing.
//!
//! Hand-written element-list messages for testing the decoder without
//! requiring kernel access or going through the builder.
//!
//! The fixtures are provided as functions that return Vec<u8> to ensure
//! proper alignment for the parser.

/// Element-list message for a set "ports" in table "filter" holding one
/// element with the 4-byte key 0.0.0.22.
pub fn elems_message() -> Vec<u8> {
    vec![
        // nlmsghdr: len=64, type=0x0a0c (NEWSETELEM), flags=NLM_F_REQUEST
        64, 0, 0, 0, // nlmsg_len
        0x0c, 0x0a, // nlmsg_type
        0x01, 0x00, // nlmsg_flags
        0, 0, 0, 0, // nlmsg_seq
        0, 0, 0, 0, // nlmsg_pid
        // nfgenmsg: family=2 (NFPROTO_IPV4), version=0, res_id=0
        2, 0, 0, 0,
        // NFTA_SET_ELEM_LIST_SET = "ports"
        10, 0, // len = 10
        2, 0, // type = NFTA_SET_ELEM_LIST_SET (2)
        b'p', b'o', b'r', b't', b's', 0, 0, 0, // "ports\0" + padding
        // NFTA_SET_ELEM_LIST_TABLE = "filter"
        11, 0, // len = 11
        1, 0, // type = NFTA_SET_ELEM_LIST_TABLE (1)
        b'f', b'i', b'l', b't', b'e', b'r', 0, 0, // "filter\0" + padding
        // NFTA_SET_ELEM_LIST_ELEMENTS (nested)
        20, 0, // len = 20
        3, 0x80, // type = 3 | NLA_F_NESTED
        // list elem (nested)
        16, 0, // len = 16
        1, 0x80, // type = NFTA_LIST_ELEM | NLA_F_NESTED
        // NFTA_SET_ELEM_KEY (nested)
        12, 0, // len = 12
        1, 0x80, // type = 1 | NLA_F_NESTED
        // NFTA_DATA_VALUE
        8, 0, // len = 8
        1, 0, // type = NFTA_DATA_VALUE (1)
        0, 0, 0, 22, // key bytes
    ]
}

/// Element-list message whose single element carries a valid key followed
/// by a flags attribute with a 2-byte payload (wire-type mismatch).
pub fn elems_message_with_bad_flags() -> Vec<u8> {
    vec![
        // nlmsghdr: len=48, type=0x0a0c (NEWSETELEM), flags=NLM_F_REQUEST
        48, 0, 0, 0, // nlmsg_len
        0x0c, 0x0a, // nlmsg_type
        0x01, 0x00, // nlmsg_flags
        0, 0, 0, 0, // nlmsg_seq
        0, 0, 0, 0, // nlmsg_pid
        // nfgenmsg: family=2, version=0, res_id=0
        2, 0, 0, 0,
        // NFTA_SET_ELEM_LIST_ELEMENTS (nested)
        28, 0, // len = 28
        3, 0x80, // type = 3 | NLA_F_NESTED
        // list elem (nested)
        24, 0, // len = 24
        1, 0x80, // type = NFTA_LIST_ELEM | NLA_F_NESTED
        // NFTA_SET_ELEM_KEY (nested), decodes cleanly
        12, 0, // len = 12
        1, 0x80, // type = 1 | NLA_F_NESTED
        8, 0, // len = 8
        1, 0, // type = NFTA_DATA_VALUE (1)
        0, 0, 0, 22, // key bytes
        // NFTA_SET_ELEM_FLAGS with a truncated payload
        6, 0, // len = 6 (2-byte payload, not a u32)
        3, 0, // type = NFTA_SET_ELEM_FLAGS (3)
        0xff, 0xff, 0, 0, // payload + padding
    ]
}

/// Element-list message whose single element starts with an attribute of
/// an unknown type code (9) that the decoder must skip.
pub fn elems_message_with_unknown_attr() -> Vec<u8> {
    vec![
        // nlmsghdr: len=48, type=0x0a0c (NEWSETELEM), flags=NLM_F_REQUEST
        48, 0, 0, 0, // nlmsg_len
        0x0c, 0x0a, // nlmsg_type
        0x01, 0x00, // nlmsg_flags
        0, 0, 0, 0, // nlmsg_seq
        0, 0, 0, 0, // nlmsg_pid
        // nfgenmsg: family=2, version=0, res_id=0
        2, 0, 0, 0,
        // NFTA_SET_ELEM_LIST_ELEMENTS (nested)
        28, 0, // len = 28
        3, 0x80, // type = 3 | NLA_F_NESTED
        // list elem (nested)
        24, 0, // len = 24
        1, 0x80, // type = NFTA_LIST_ELEM | NLA_F_NESTED
        // Unknown attribute type 9, skipped for forward compatibility
        8, 0, // len = 8
        9, 0, // type = 9 (beyond NFTA_SET_ELEM_MAX)
        1, 2, 3, 4, // opaque payload
        // NFTA_SET_ELEM_KEY (nested)
        12, 0, // len = 12
        1, 0x80, // type = 1 | NLA_F_NESTED
        8, 0, // len = 8
        1, 0, // type = NFTA_DATA_VALUE (1)
        0, 0, 0, 22, // key bytes
    ]
}
