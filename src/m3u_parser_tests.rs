//! Tests for Extended M3U playlist parsing

#[cfg(test)]
mod tests {
    use crate::config::IngestConfig;
    use crate::diagnostics::Skip;
    use crate::epg::load_json_epg;
    use crate::m3u_parser::*;

    #[test]
    fn test_parse_m3u() {
        let content = r#"
#EXTM3U
#EXTINF:-1 tvg-id="cnn" group-title="News",CNN
http://example.com/live/user/pass/1.ts
#EXTINF:-1 tvg-id="bbc" group-title="News",BBC
http://example.com/live/user/pass/2.ts
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].title, "CNN");
        assert_eq!(channels[0].group_title(), "News");
        assert_eq!(channels[1].index, 1);
    }

    #[test]
    fn test_single_channel_scenario() {
        let content = "#EXTM3U\n#EXTINF:-1 tvg-id=\"1\" group-title=\"News\",Ch1\nhttp://x/1\n";
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.channels.len(), 1);
        let ch = &playlist.channels[0];
        assert_eq!(ch.title, "Ch1");
        assert_eq!(ch.group_title(), "News");
        assert_eq!(ch.url, "http://x/1");
        assert_eq!(ch.duration, -1);
        assert_eq!(ch.raw_extinf, "#EXTINF:-1 tvg-id=\"1\" group-title=\"News\",Ch1");
        assert!(playlist.diagnostics.is_clean());
    }

    #[test]
    fn test_extinf_without_url_dropped() {
        let content = "#EXTINF:-1 tvg-id=\"9\" group-title=\"Misc\"";
        let playlist = Playlist::parse(content);
        assert!(playlist.channels.is_empty());
        assert_eq!(
            playlist.diagnostics.skipped(),
            &[Skip::MalformedEntry { line: 1 }]
        );
    }

    #[test]
    fn test_dropped_entries_do_not_consume_index() {
        let content = r#"#EXTM3U
#EXTINF:-1,Broken
#EXTINF:-1,First
http://x/1
#EXTINF:-1,Also broken

#EXTINF:-1,Second
http://x/2
#EXTINF:-1,Trailing
"#;
        let playlist = Playlist::parse(content);
        let indexes: Vec<usize> = playlist.channels.iter().map(|c| c.index).collect();
        let titles: Vec<&str> = playlist.channels.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(playlist.diagnostics.total(), 3);
    }

    #[test]
    fn test_keep_unplayable_entries() {
        let config = IngestConfig {
            keep_unplayable: true,
            ..Default::default()
        };
        let content = "#EXTINF:-1,NoUrl\n#EXTINF:-1,Ok\nhttp://x/1\n";
        let playlist = Playlist::parse_with(content, &config);
        assert_eq!(playlist.channels.len(), 2);
        assert!(!playlist.channels[0].is_playable());
        assert_eq!(playlist.channels[0].title, "NoUrl");
        assert_eq!(playlist.channels[1].index, 1);
        assert!(playlist.channels[1].is_playable());
    }

    #[test]
    fn test_parse_m3u_with_epg_url() {
        let content = r#"#EXTM3U x-tvg-url="http://example.com/epg.xml"
#EXTINF:-1 tvg-id="ch1" tvg-name="Channel One" group-title="General" catchup="default" catchup-days="7",Channel 1
http://example.com/live/user/pass/1.ts
"#;
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.epg_url(), Some("http://example.com/epg.xml"));
        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.channels[0].tvg_name(), "Channel One");
        assert_eq!(playlist.channels[0].attrs.get("catchup"), Some("default"));
        assert_eq!(playlist.channels[0].attrs.get("catchup-days"), Some("7"));
    }

    #[test]
    fn test_url_tvg_header_fallback() {
        let playlist = Playlist::parse("#EXTM3U url-tvg=\"http://e/guide.xml.gz\"\n");
        assert_eq!(playlist.epg_url(), Some("http://e/guide.xml.gz"));
        assert!(Playlist::parse("#EXTM3U\n").epg_url().is_none());
    }

    #[test]
    fn test_parse_attrs_unquoted() {
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-id=unquoted group-title="Quoted Group" tvg-logo='single.png',Test Channel
http://example.com/stream.ts
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].tvg_id(), "unquoted");
        assert_eq!(channels[0].tvg_logo(), "single.png");
        assert_eq!(channels[0].group_title(), "Quoted Group");
    }

    #[test]
    fn test_parse_malformed_stray_quotes() {
        // Real-world format with stray quote before tvg-name
        let content = r#"#EXTM3U
#EXTINF:0 tvg-logo="https://example.com/logo.png" "tvg-name="SRF1.ch" tvg-chno="1108" group-title="Deutsch", SRF 1 FHD
udp://@233.50.230.1:5000
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].title, "SRF 1 FHD");
        assert_eq!(channels[0].duration, 0);
        assert_eq!(channels[0].tvg_logo(), "https://example.com/logo.png");
        assert_eq!(channels[0].tvg_name(), "SRF1.ch");
        assert_eq!(channels[0].attrs.get("tvg-chno"), Some("1108"));
        assert_eq!(channels[0].group_title(), "Deutsch");
        assert_eq!(channels[0].url, "udp://@233.50.230.1:5000");
    }

    #[test]
    fn test_parse_extinf_without_hash() {
        // Some malformed M3Us have EXTINF without # prefix
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-id="" tvg-name="Channel 1" group-title="Group",Channel 1
http://example.com/1.mp4
EXTINF:-1 tvg-id="" tvg-name="Channel 2" group-title="Group",Channel 2
http://example.com/2.mp4
#EXTINF:-1 tvg-id="" tvg-name="Channel 3" group-title="Group",Channel 3
http://example.com/3.mp4
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].title, "Channel 1");
        assert_eq!(channels[1].title, "Channel 2");
        assert_eq!(channels[2].title, "Channel 3");
        // empty tvg-id does not seed epg-id
        assert_eq!(channels[0].attrs.get("epg-id"), None);
    }

    #[test]
    fn test_parse_attrs_after_duration_comma() {
        // Alternate format: duration,attrs,name (attrs after first comma)
        let content = r#"#EXTM3U
#EXTINF:10.000000,TVG-ID="Channel1" tvg-name="Channel 1" tvg-logo="http://example.com/channel1.png" group-title="Entertainment",Channel 1
http://example.com/stream1.ts
#EXTINF:10.000000,TVG-ID="Channel2" tvg-name="Channel 2" tvg-logo="http://example.com/channel2.png" group-title="Entertainment",Channel 2
http://example.com/stream2.ts
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].title, "Channel 1");
        assert_eq!(channels[0].duration, 10);
        assert_eq!(channels[0].tvg_id(), "Channel1");
        assert_eq!(channels[0].group_title(), "Entertainment");
        assert_eq!(channels[1].tvg_id(), "Channel2");
    }

    #[test]
    fn test_title_keeps_commas() {
        let content = "#EXTINF:-1 group-title=\"Movies\",Good, Bad and Ugly\nhttp://x/1\n";
        let channels = parse_m3u(content);
        assert_eq!(channels[0].title, "Good, Bad and Ugly");
    }

    // ========== Directive Context Tests ==========

    #[test]
    fn test_extgrp_fallback_and_default_group() {
        let content = r#"#EXTM3U
#EXTGRP:Sports
#EXTINF:-1,Arena
http://x/1
#EXTINF:-1,Loose
http://x/2
#EXTGRP:Sports
#EXTINF:-1 group-title="News",Override
http://x/3
"#;
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.channels[0].group, "Sports");
        assert_eq!(playlist.channels[0].group_title(), "Sports");
        // EXTGRP does not carry past the entry it belongs to
        assert_eq!(playlist.channels[1].group, "");
        assert_eq!(playlist.channels[1].group_title(), "Other");
        assert_eq!(playlist.channels[2].group_title(), "News");
    }

    #[test]
    fn test_groups_first_seen_order() {
        let content = r#"#EXTM3U
#EXTINF:-1 group-title="B",1
http://x/1
#EXTINF:-1 group-title="A",2
http://x/2
#EXTINF:-1,3
http://x/3
#EXTINF:-1 group-title="B",4
http://x/4
#EXTINF:-1 group-title="",5
http://x/5
"#;
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.groups(), vec!["B", "A", "Other"]);

        let picked = playlist.filter_by_groups(&["Other"]);
        let titles: Vec<&str> = picked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["3", "5"]);
    }

    #[test]
    fn test_property_lines_attach_to_next_entry() {
        let content = r#"#EXTM3U
#EXTVLCOPT:http-user-agent=Mozilla/5.0
#EXTVLCOPT:http-referrer=http://ref/
#KODIPROP:inputstream.adaptive.license_type=com.widevine.alpha
#EXTHTTP:{"cookie":"a=b"}
#EXTIMG:http://x/logo.png
#EXT-X-PROGRAM-DATE-TIME:2025-01-01T00:00:00Z
#EXTINF:-1,Protected
http://x/1.mpd
#EXTINF:-1,Plain
http://x/2
"#;
        let playlist = Playlist::parse(content);
        let ch = &playlist.channels[0];
        assert_eq!(
            ch.properties,
            vec![
                "#EXTVLCOPT:http-user-agent=Mozilla/5.0",
                "#EXTVLCOPT:http-referrer=http://ref/",
                "#KODIPROP:inputstream.adaptive.license_type=com.widevine.alpha",
                r#"#EXTHTTP:{"cookie":"a=b"}"#,
                "#EXTIMG:http://x/logo.png",
            ]
        );
        assert_eq!(ch.vlc_opts.get("http-user-agent").map(String::as_str), Some("Mozilla/5.0"));
        assert_eq!(ch.vlc_opts.get("http-referrer").map(String::as_str), Some("http://ref/"));
        assert_eq!(
            ch.kodi_props
                .get("inputstream.adaptive.license_type")
                .map(String::as_str),
            Some("com.widevine.alpha")
        );
        assert_eq!(ch.other_props, vec!["#EXT-X-PROGRAM-DATE-TIME:2025-01-01T00:00:00Z"]);

        let plain = &playlist.channels[1];
        assert!(plain.properties.is_empty());
        assert!(plain.vlc_opts.is_empty());
        assert!(plain.other_props.is_empty());
    }

    #[test]
    fn test_directives_between_extinf_and_url() {
        let content = r#"#EXTM3U
#EXTINF:-1,Late Group
#EXTGRP:Kids

#EXTVLCOPT:http-user-agent=Kodi
http://x/1
"#;
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.channels.len(), 1);
        let ch = &playlist.channels[0];
        assert_eq!(ch.group_title(), "Kids");
        assert_eq!(ch.vlc_opts.get("http-user-agent").map(String::as_str), Some("Kodi"));
    }

    #[test]
    fn test_discarded_entry_drops_its_context_only() {
        let content = r#"#EXTM3U
#EXTGRP:Lost
#EXTVLCOPT:http-user-agent=Lost
#EXTINF:-1,Broken
#EXTVLCOPT:http-user-agent=Kept
#EXTINF:-1,Good
http://x/1
"#;
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.channels.len(), 1);
        let ch = &playlist.channels[0];
        assert_eq!(ch.title, "Good");
        assert_eq!(ch.group_title(), "Other");
        assert_eq!(ch.properties, vec!["#EXTVLCOPT:http-user-agent=Kept"]);
    }

    #[test]
    fn test_blank_lines_keep_context() {
        let content = "#EXTGRP:Music\n\n\n#EXTINF:-1,Radio\n\n\nhttp://x/radio\n";
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.channels[0].group_title(), "Music");
        assert_eq!(playlist.channels[0].url, "http://x/radio");
    }

    #[test]
    fn test_commented_out_url_accepted() {
        let content = "#EXTM3U\n#EXTINF:-1,Hidden\n#http://x/hidden.ts\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].url, "http://x/hidden.ts");
    }

    #[test]
    fn test_comments_and_stray_urls_ignored() {
        let content = "#EXTM3U\n# generated by tool\nhttp://x/orphan\n#EXTINF:-1,Real\nhttp://x/real\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].url, "http://x/real");
    }

    #[test]
    fn test_bom_and_crlf() {
        let content = "\u{feff}#EXTM3U\r\n#EXTINF:-1 tvg-id=\"a\",Windows\r\nhttp://x/win\r\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].title, "Windows");
        assert_eq!(channels[0].url, "http://x/win");
    }

    // ========== EPG Id Seeding Tests ==========

    #[test]
    fn test_epg_id_seeding_priority() {
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-id="t1",A
http://x/1
#EXTINF:-1 tvg-id="t2" epg_channel_id="e2",B
http://x/2
#EXTINF:-1 tvg-id="t3" epg-id="own",C
http://x/3
#EXTINF:-1,D
http://x/4
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].epg_id(), "t1");
        assert_eq!(channels[1].epg_id(), "e2");
        assert_eq!(channels[2].epg_id(), "own");
        assert_eq!(channels[3].attrs.get("epg-id"), None);
    }

    #[test]
    fn test_shared_tvg_id_maps_both_channels() {
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-id="5",Five HD
http://x/5hd
#EXTINF:-1 tvg-id="5",Five SD
http://x/5sd
"#;
        let mut playlist = Playlist::parse(content);
        let index = load_json_epg(
            r#"{"programmes": [{"channel": "5", "start": "20250101000000", "title": "Morning"}]}"#,
            None,
        );
        assert_eq!(playlist.map_epg(&index), 2);
        let first = playlist.channels[0].epg.as_ref().unwrap();
        let second = playlist.channels[1].epg.as_ref().unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].title, "Morning");
    }

    #[test]
    fn test_map_epg_with_config_key_order() {
        let content = "#EXTINF:-1 tvg-id=\"t\" tvg-name=\"N\",Ch\nhttp://x/1\n";
        let mut playlist = Playlist::parse(content);
        let index = load_json_epg(r#"{"programmes": [{"channel": "N", "title": "By name"}]}"#, None);
        assert_eq!(playlist.map_epg(&index), 0);

        let config = IngestConfig::from_json(r#"{"epg_key_order": ["tvg-name"]}"#).unwrap();
        assert_eq!(playlist.map_epg_with_config(&index, &config), 1);
    }

    // ========== Re-export Tests ==========

    #[test]
    fn test_to_block_round_trip() {
        let content = r#"#EXTM3U
#EXTVLCOPT:http-user-agent=VLC
#EXTINF:-1 tvg-id="x" tvg-name='Quoted, Name' group-title=News,  Title, with commas
http://x/1
#EXTINF:5,Bare
rtmp://x/2
"#;
        let playlist = Playlist::parse(content);
        assert_eq!(playlist.channels.len(), 2);

        for ch in &playlist.channels {
            let block = Playlist::to_block(ch);
            let reparsed = parse_m3u(&block);
            assert_eq!(reparsed.len(), 1);
            assert_eq!(reparsed[0].attrs, ch.attrs);
            assert_eq!(reparsed[0].url, ch.url);
            assert_eq!(reparsed[0].title, ch.title);
        }

        assert_eq!(
            Playlist::to_block(&playlist.channels[0]),
            "#EXTVLCOPT:http-user-agent=VLC\n\
             #EXTINF:-1 tvg-id=\"x\" tvg-name='Quoted, Name' group-title=News,  Title, with commas\n\
             http://x/1"
        );
    }

    #[test]
    fn test_synthesized_block_round_trip() {
        let content = "#EXTINF:-1 tvg-name=\"Say \\\"hi\\\"\" group-title=\"G\",T\nhttp://x/1\n";
        let mut ch = parse_m3u(content).remove(0);
        assert_eq!(ch.tvg_name(), "Say \"hi\"");
        ch.raw_extinf.clear();

        let block = ch.to_block();
        assert!(block.starts_with("#EXTINF:-1 group-title=\"G\""));
        let reparsed = parse_m3u(&block);
        assert_eq!(reparsed[0].attrs, ch.attrs);
        assert_eq!(reparsed[0].title, "T");
    }

    #[test]
    fn test_export_filtered_playlist() {
        let content = r#"#EXTM3U
#EXTINF:-1 group-title="News",N1
http://x/n1
#EXTINF:-1 group-title="Sport",S1
http://x/s1
"#;
        let playlist = Playlist::parse(content);
        let exported = export_m3u(playlist.filter_by_groups(&["Sport"]));
        assert_eq!(exported, "#EXTM3U\n#EXTINF:-1 group-title=\"Sport\",S1\nhttp://x/s1\n");

        let reparsed = Playlist::parse(&exported);
        assert_eq!(reparsed.groups(), vec!["Sport"]);
        assert_eq!(Playlist::to_blocks(&reparsed.channels).len(), 1);
    }

    #[test]
    fn test_unsorted_attributes_round_trip() {
        let content = "#EXTINF:-1 tvg-name=\"Zed\" group-title=\"G\" tvg-id=\"z.1\" catchup=\"default\",Zed\nhttp://x/z\n";
        let mut ch = parse_m3u(content).remove(0);
        ch.raw_extinf.clear();

        let block = ch.to_block();
        assert!(block.starts_with(
            "#EXTINF:-1 catchup=\"default\" epg-id=\"z.1\" group-title=\"G\" tvg-id=\"z.1\""
        ));
        let reparsed = parse_m3u(&block).remove(0);
        assert_eq!(reparsed.attrs, ch.attrs);
        assert_eq!(reparsed.tvg_id(), "z.1");
        assert_eq!(reparsed.title, "Zed");
    }

    // ========== Title And Value Edge Cases ==========

    #[test]
    fn test_title_that_looks_like_assignment() {
        let channels = parse_m3u("#EXTINF:-1 tvg-id=\"a\",E=MC2\nhttp://x/1\n");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].title, "E=MC2");
        assert_eq!(channels[0].attrs.len(), 1);
        assert_eq!(channels[0].tvg_id(), "a");
    }

    #[test]
    fn test_windows_path_logo_keeps_following_attrs() {
        let content = "#EXTINF:-1 tvg-logo=\"C:\\logos\\\" tvg-id=\"x\",T\nhttp://x/1\n";
        let channels = parse_m3u(content);
        assert_eq!(channels[0].tvg_logo(), "C:\\logos\\");
        assert_eq!(channels[0].tvg_id(), "x");
        assert_eq!(channels[0].title, "T");
    }

    #[test]
    fn test_groups_many_channels() {
        let mut content = String::from("#EXTM3U\n");
        for i in 0..500 {
            content.push_str(&format!(
                "#EXTINF:-1 group-title=\"G{}\",C{}\nhttp://x/{}\n",
                i % 7,
                i,
                i
            ));
        }
        let playlist = Playlist::parse(&content);
        assert_eq!(playlist.channels.len(), 500);
        assert_eq!(
            playlist.groups(),
            vec!["G0", "G1", "G2", "G3", "G4", "G5", "G6"]
        );
    }
}
